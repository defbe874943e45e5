// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry for TVMDP.
//!
//! Provides structured logging, lifecycle spans, and metrics through the
//! `metrics` facade.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_load, record_run, record_unload, MODELS_LOADED, MODEL_LOADS, MODEL_LOAD_FAILURES,
    MODEL_UNLOADS, RUNS, RUN_FAILURES, RUN_LATENCY,
};
pub use spans::{LifecycleSpan, SpanExt};
