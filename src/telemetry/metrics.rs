// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle and dispatch metrics through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op.

use ::metrics::{counter, gauge, histogram};

use crate::engine::RunResult;
use crate::models::ModelId;

pub const MODEL_LOADS: &str = "tvmdp_model_loads_total";
pub const MODEL_LOAD_FAILURES: &str = "tvmdp_model_load_failures_total";
pub const MODEL_UNLOADS: &str = "tvmdp_model_unloads_total";
pub const MODELS_LOADED: &str = "tvmdp_models_loaded";
pub const RUNS: &str = "tvmdp_runs_total";
pub const RUN_FAILURES: &str = "tvmdp_run_failures_total";
pub const RUN_LATENCY: &str = "tvmdp_run_latency_ticks";

/// Record a load attempt and the resulting number of loaded slots.
pub fn record_load(model_id: ModelId, ok: bool, loaded: usize) {
    let label = model_id.to_string();
    if ok {
        counter!(MODEL_LOADS, "model_id" => label).increment(1);
    } else {
        counter!(MODEL_LOAD_FAILURES, "model_id" => label).increment(1);
    }
    gauge!(MODELS_LOADED).set(loaded as f64);
}

pub fn record_unload(model_id: ModelId, loaded: usize) {
    counter!(MODEL_UNLOADS, "model_id" => model_id.to_string()).increment(1);
    gauge!(MODELS_LOADED).set(loaded as f64);
}

pub fn record_run(model_id: ModelId, result: &RunResult) {
    let label = model_id.to_string();
    counter!(RUNS, "model_id" => label.clone()).increment(1);
    if !result.is_ok() {
        counter!(RUN_FAILURES, "model_id" => label.clone()).increment(1);
    }
    histogram!(RUN_LATENCY, "model_id" => label).record(result.latency() as f64);
}
