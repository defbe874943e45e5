// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Seams to the external tensor-compiler runtime.
//!
//! TVMDP never compiles, schedules or executes tensors itself. A
//! [`TensorRuntime`] loads a compiled code module from a filesystem path and
//! builds a [`GraphExecutor`] from it; the executor exposes the named graph
//! functions the lifecycle and dispatcher need.
//!
//! ```text
//! load_module(path) ──► Module
//! create_executor(graph_json, Module, device, backend) ──► Executor
//!     load_params / contains_param / num_outputs
//!     input_shape(name) / output_shape(index)
//!     set_input_zero_copy / set_output_zero_copy / run
//! ```

mod tensor;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::models::ModelId;

pub use tensor::{DataType, Device, DeviceHandle, DeviceKind, TensorMut, TensorRef};

/// Failure reported by the external runtime or a layer backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RuntimeError {
    message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Loader half of the runtime contract.
pub trait TensorRuntime {
    /// Handle to a loaded code module.
    type Module;
    /// Graph executor built from a module and a topology description.
    type Executor: GraphExecutor;

    /// Load a compiled shared-object module from `path`.
    ///
    /// The file at `path` only lives until this call returns; implementations
    /// must finish reading it before returning.
    fn load_module(&self, path: &Path) -> Result<Self::Module, RuntimeError>;

    /// Construct a graph executor from the topology JSON and a loaded module.
    fn create_executor(
        &self,
        graph_json: &str,
        module: Self::Module,
        device: Device,
        backend: Option<Arc<dyn LayerBackend>>,
    ) -> Result<Self::Executor, RuntimeError>;
}

/// Executable model handle. Dropping it releases the runtime resources.
///
/// Pointers recorded by [`set_input_zero_copy`](Self::set_input_zero_copy)
/// and [`set_output_zero_copy`](Self::set_output_zero_copy) are valid only
/// until the next [`run`](Self::run) returns.
pub trait GraphExecutor {
    /// Load the parameter blob ("load_params").
    fn load_params(&mut self, params: &[u8]) -> Result<(), RuntimeError>;

    /// Whether `name` is a key of the loaded parameter map.
    fn contains_param(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Number of graph outputs ("get_num_outputs").
    fn num_outputs(&self) -> Result<usize, RuntimeError>;

    /// Shape of the input tensor named `name` ("get_input").
    ///
    /// A rank above [`SHAPE_DIM_MAX`](crate::models::SHAPE_DIM_MAX) is
    /// [`TvmdpError::CapacityExceeded`](crate::TvmdpError::CapacityExceeded).
    fn input_shape(&self, name: &str) -> crate::Result<Vec<i64>>;

    /// Shape of the output tensor at `index` ("get_output").
    fn output_shape(&self, index: usize) -> crate::Result<Vec<i64>>;

    /// Bind a caller-owned buffer as input `index` ("set_input_zero_copy").
    fn set_input_zero_copy(&mut self, index: usize, tensor: &TensorRef<'_>) -> Result<(), RuntimeError>;

    /// Bind a caller-owned buffer as output `index` ("set_output_zero_copy").
    fn set_output_zero_copy(
        &mut self,
        index: usize,
        tensor: &mut TensorMut<'_>,
    ) -> Result<(), RuntimeError>;

    /// Execute the graph over the bound tensors ("run").
    fn run(&mut self) -> Result<(), RuntimeError>;
}

/// Alternate-backend layer hooks supplied at load time.
///
/// TVMDP stores the backend with the slot and hands it to the runtime; it
/// never calls these hooks itself.
pub trait LayerBackend: Send + Sync {
    fn load_layer(&self, model_id: ModelId, layer: &str, buffer: &[u8]) -> Result<(), RuntimeError>;

    fn unload_layer(&self, model_id: ModelId, layer: &str) -> Result<(), RuntimeError>;
}
