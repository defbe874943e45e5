// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! `tvmdp-cli` entry point.
//!
//! Offline companion to the library:
//! - Greeting check
//! - Stage-1 metadata inspection of topology files and artifact directories
//! - Configuration display
//!
//! ## CLI Subcommands
//!
//! - `tvmdp-cli hello` - Print the greeting
//! - `tvmdp-cli inspect <graph.json>` - Structural metadata as JSON
//! - `tvmdp-cli inspect-dir <model_dir>` - Same, from an artifact directory
//! - `tvmdp-cli config show|defaults` - Configuration

use std::path::Path;
use std::process::ExitCode;

use tvmdp::cli::{config_cmd, inspect_cmd, EXIT_OK, EXIT_USAGE};
use tvmdp::config as tvmdp_config;
use tvmdp::telemetry::init_logging;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let env = tvmdp_config::load();
    if let Err(e) = init_logging(&env.log) {
        eprintln!("Logging disabled: {}", e);
    }

    match command {
        "hello" => {
            tvmdp::hello();
            ExitCode::SUCCESS
        }
        "inspect" => match args.get(2) {
            Some(path) => ExitCode::from(inspect_cmd::run_inspect(Path::new(path))),
            None => {
                eprintln!("Usage: tvmdp-cli inspect <graph.json>");
                ExitCode::from(EXIT_USAGE)
            }
        },
        "inspect-dir" => match args.get(2) {
            Some(dir) => ExitCode::from(inspect_cmd::run_inspect_dir(Path::new(dir))),
            None => {
                eprintln!("Usage: tvmdp-cli inspect-dir <model_dir>");
                ExitCode::from(EXIT_USAGE)
            }
        },
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    config_cmd::run_show(json);
                    ExitCode::from(EXIT_OK)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::from(EXIT_OK)
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::from(EXIT_USAGE)
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("tvmdp-cli {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "tvmdp-cli - TVM dataplane model tooling v{}

USAGE:
    tvmdp-cli <COMMAND> [ARGS]

COMMANDS:
    hello        Print the library greeting
    inspect      Show structural metadata of a topology JSON file
    inspect-dir  Show structural metadata of a compiled model directory
    config       Show configuration (show, defaults)
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    TVMDP_NB_MODELS    Default slot count for C drivers (default: 16)
    TVMDP_STAGING_DIR  Staging directory for code modules (default: OS temp dir)
    TVMDP_DEVICE       Runtime device, kind[:id] (default: cpu:0)
    TVMDP_LOG_LEVEL    Log filter directive (default: info)
    TVMDP_LOG_FORMAT   json or pretty (default: json)
    TVMDP_LOG_FILE     Log file (default: stderr)

EXIT CODES:
    0  Success
    1  Usage error
    2  Parse or I/O error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "inspect" => {
            eprintln!(
                "tvmdp-cli inspect - Structural metadata

USAGE:
    tvmdp-cli inspect <graph.json>

DESCRIPTION:
    Parses the topology description and lists one layer per compiled
    subgraph node, tagged with its external compiler (default: llvm).
    Output is pretty-printed JSON on stdout.

EXAMPLES:
    tvmdp-cli inspect build/mod.json
"
            );
        }
        "inspect-dir" => {
            eprintln!(
                "tvmdp-cli inspect-dir - Structural metadata of a model directory

USAGE:
    tvmdp-cli inspect-dir <model_dir>

DESCRIPTION:
    Maps the *.so, *.json and *.params artifacts of a compiled model
    directory and inspects its topology. Fails if any artifact is missing
    or ambiguous.
"
            );
        }
        "config" => {
            eprintln!(
                "tvmdp-cli config - Show configuration

USAGE:
    tvmdp-cli config <SUBCOMMAND>

SUBCOMMANDS:
    show [--json]  Show effective configuration
    defaults       Show default configuration
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'tvmdp-cli help' for general usage.",
                command
            );
        }
    }
}
