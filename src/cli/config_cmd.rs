// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults.
//!
//! These commands read configuration directly from environment variables.

use crate::config::{self, EffectiveConfig, DEFAULT_NB_MODELS};

/// Print effective config as key-value pairs to stdout.
pub fn run_show(json: bool) {
    let cfg = config::load().effective_config();
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    } else {
        print_config(&cfg);
    }
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("TVMDP_NB_MODELS={DEFAULT_NB_MODELS}");
    println!("TVMDP_STAGING_DIR={}", std::env::temp_dir().display());
    println!("TVMDP_DEVICE=cpu:0");
    println!("TVMDP_LOG_LEVEL=info");
    println!("TVMDP_LOG_FORMAT=json");
    println!("TVMDP_LOG_FILE=");
}

fn print_config(cfg: &EffectiveConfig) {
    for (key, value) in config_lines(cfg) {
        println!("{key}={value}");
    }
}

fn config_lines(cfg: &EffectiveConfig) -> Vec<(&'static str, String)> {
    vec![
        ("TVMDP_NB_MODELS", cfg.nb_models.to_string()),
        ("TVMDP_STAGING_DIR", cfg.staging_dir.clone()),
        ("TVMDP_DEVICE", cfg.device.clone()),
        ("TVMDP_LOG_LEVEL", cfg.log_level.clone()),
        ("TVMDP_LOG_FORMAT", cfg.log_format.clone()),
        ("TVMDP_LOG_FILE", cfg.log_file.clone().unwrap_or_default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EffectiveConfig {
        EffectiveConfig {
            nb_models: 16,
            staging_dir: "/tmp".into(),
            device: "cpu:0".into(),
            log_level: "info".into(),
            log_format: "json".into(),
            log_file: None,
        }
    }

    #[test]
    fn test_config_lines_cover_every_variable() {
        let lines = config_lines(&sample());
        let keys: Vec<_> = lines.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            [
                "TVMDP_NB_MODELS",
                "TVMDP_STAGING_DIR",
                "TVMDP_DEVICE",
                "TVMDP_LOG_LEVEL",
                "TVMDP_LOG_FORMAT",
                "TVMDP_LOG_FILE",
            ]
        );
        assert_eq!(lines[0].1, "16");
        assert_eq!(lines[5].1, "");
    }

    #[test]
    fn test_print_config_smoke() {
        // Must not panic.
        print_config(&sample());
    }
}
