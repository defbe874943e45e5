// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for `tvmdp-cli`.
//!
//! Offline tooling around the library: structural inspection of compiled
//! model artifacts and configuration display. Nothing here loads a runtime.
//!
//! ## Usage
//!
//! ```bash
//! tvmdp-cli hello                      # Print the greeting
//! tvmdp-cli inspect graph.json         # Stage-1 metadata as JSON
//! tvmdp-cli inspect-dir ./model        # Same, from an artifact directory
//! tvmdp-cli config show                # Effective configuration
//! ```

pub mod config_cmd;
pub mod inspect_cmd;

/// Exit code for success.
pub const EXIT_OK: u8 = 0;
/// Exit code for a usage error.
pub const EXIT_USAGE: u8 = 1;
/// Exit code for a parse or I/O error.
pub const EXIT_FAILED: u8 = 2;
