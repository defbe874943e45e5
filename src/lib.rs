// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! TVMDP: model lifecycle and inference dispatch for accelerator dataplanes.
//!
//! Sits between a dataplane driver and an external tensor-compiler runtime.
//! Manages a fixed pool of model slots, stages compiled artifacts into the
//! runtime, extracts model metadata, and dispatches zero-copy inference.
//!
//! # Design Principles
//!
//! - **No compute**: compilation, tensor math and execution belong to the
//!   runtime behind [`runtime::TensorRuntime`]
//! - **No hidden state**: all state lives in an explicit [`Tvmdp`] context
//! - **No internal locking**: one writer per slot, enforced by `&mut`
//! - **Explicit handshake**: completion is an atomic flag with
//!   release/acquire ordering
//!
//! # Lifecycle
//!
//! ```text
//! Tvmdp::new ─► configure ─► load ─► metadata ─► run ... ─► unload ─► close
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod models;
pub mod runtime;
pub mod telemetry;

pub use context::{LoadOptions, Tvmdp};
pub use engine::{Clock, CompletionSignal, InferenceOp, MonotonicClock, ResultSink, RunResult};
pub use error::{Result, TvmdpError};
pub use models::{
    extract_structural, ArtifactBundle, ArtifactDescriptor, ModelId, ModelMetadata, Registry,
};
pub use runtime::{
    DataType, Device, DeviceHandle, GraphExecutor, LayerBackend, RuntimeError, TensorMut,
    TensorRef, TensorRuntime,
};

/// Greeting printed by [`hello`].
pub const GREETING: &str = "Hello TVMDP!!!";

/// Print the library greeting. Liveness check for driver integration.
pub fn hello() {
    println!("{GREETING}");
}
