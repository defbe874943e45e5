// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inference dispatch engine.
//!
//! Handles clock sources, the zero-copy run path and the completion
//! handshake with polling callers.

mod clock;
mod completion;
pub(crate) mod dispatch;

pub use clock::{Clock, MonotonicClock};
pub use completion::{CompletionSignal, ResultSink, RunResult};
pub use dispatch::InferenceOp;
