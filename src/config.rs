// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading from environment variables.
//!
//! All values are read from `TVMDP_*` environment variables with sensible
//! defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `TVMDP_NB_MODELS` | 16 | Default slot count for C drivers |
//! | `TVMDP_STAGING_DIR` | OS temp dir | Directory for staged code modules |
//! | `TVMDP_DEVICE` | `cpu:0` | Runtime device (`kind[:id]`) |
//! | `TVMDP_LOG_LEVEL` | `info` | Log filter directive |
//! | `TVMDP_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `TVMDP_LOG_FILE` | unset | Log file (stderr when unset) |

use std::path::PathBuf;

use serde::Serialize;

use crate::runtime::Device;
use crate::telemetry::{LogConfig, LogFormat};

/// Settings a context is built with.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Device handed to the runtime and reported in tensor metadata.
    pub device: Device,
    /// Where code modules are staged during load.
    pub staging_dir: PathBuf,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            device: Device::default(),
            staging_dir: std::env::temp_dir(),
        }
    }
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub nb_models: u16,
    pub staging_dir: String,
    pub device: String,
    pub log_level: String,
    pub log_format: String,
    pub log_file: Option<String>,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub nb_models: u16,
    pub context: ContextConfig,
    pub log: LogConfig,
}

pub const DEFAULT_NB_MODELS: u16 = 16;

/// Parse a `u16` env var, returning `default` on missing or invalid.
fn parse_u16(key: &str, default: u16) -> u16 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u16>().unwrap_or(default),
        Err(_) => default,
    }
}

fn load_device() -> Device {
    std::env::var("TVMDP_DEVICE")
        .ok()
        .and_then(|v| v.parse::<Device>().ok())
        .unwrap_or_default()
}

fn load_staging_dir() -> PathBuf {
    match std::env::var("TVMDP_STAGING_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir(),
    }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("TVMDP_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("TVMDP_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(defaults.format);
    let output_path = std::env::var("TVMDP_LOG_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    LogConfig {
        format,
        level,
        output_path,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let nb_models = parse_u16("TVMDP_NB_MODELS", DEFAULT_NB_MODELS).max(1);

    EnvConfig {
        nb_models,
        context: ContextConfig {
            device: load_device(),
            staging_dir: load_staging_dir(),
        },
        log: load_log_config(),
    }
}

impl EnvConfig {
    pub fn context_config(&self) -> ContextConfig {
        self.context.clone()
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            nb_models: self.nb_models,
            staging_dir: self.context.staging_dir.display().to_string(),
            device: self.context.device.to_string(),
            log_level: self.log.level.clone(),
            log_format: match self.log.format {
                LogFormat::Json => "json".into(),
                LogFormat::Pretty => "pretty".into(),
            },
            log_file: self.log.output_path.as_ref().map(|p| p.display().to_string()),
        }
    }
}
