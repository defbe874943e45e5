// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span utilities for lifecycle operations.
//!
//! Provides standardized span creation and result recording.

use tracing::{debug_span, info_span, Span};

use crate::models::ModelId;

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for lifecycle spans.
///
/// Fields included:
/// - `model_id`: Slot the operation targets
/// - `status`: To be filled in by `SpanExt::record_result`
/// - `error.message`: To be filled in on error
pub struct LifecycleSpan;

impl LifecycleSpan {
    /// Span covering staging, runtime load and parameter load.
    pub fn load(model_id: ModelId) -> Span {
        info_span!(
            "model_load",
            model_id = %model_id,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }

    /// Span covering one inference run. Debug level: runs are hot.
    pub fn run(model_id: ModelId) -> Span {
        debug_span!(
            "model_run",
            model_id = %model_id,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
