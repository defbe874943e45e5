// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model metadata records.
//!
//! Lists are dynamically sized but never allowed past the fixed capacities
//! of the C metadata record; exceeding one is [`TvmdpError::CapacityExceeded`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, TvmdpError};
use crate::runtime::{DataType, Device};

/// Longest name that fits a 32-byte NUL-terminated field.
pub const NAME_MAX_LEN: usize = 31;
/// Maximum number of layers per model.
pub const LAYERS_MAX: usize = 32;
/// Maximum number of inputs, and separately of outputs, per model.
pub const INPUT_OUTPUT_MAX: usize = 32;
/// Maximum tensor rank.
pub const SHAPE_DIM_MAX: usize = 8;

/// Backend tag used when a compiled subgraph names no external compiler.
pub const DEFAULT_LAYER_BACKEND: &str = "llvm";

/// Fail with `CapacityExceeded` if `len > max`.
pub(crate) fn ensure_capacity(what: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(TvmdpError::CapacityExceeded { what, len, max });
    }
    Ok(())
}

pub(crate) fn ensure_name(what: &'static str, name: &str) -> Result<()> {
    ensure_capacity(what, name.len(), NAME_MAX_LEN)
}

/// Structural and runtime description of one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model: ModelInfo,
    pub input: Vec<IoTensorSpec>,
    pub output: Vec<IoTensorSpec>,
}

/// Model section of the metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub num_input: usize,
    pub num_output: usize,
    pub layers: Vec<LayerInfo>,
}

/// One compiled subgraph of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub name: String,
    /// Backend tag, e.g. `mrvl` for accelerator subgraphs or `llvm`.
    pub backend: String,
}

impl LayerInfo {
    pub fn new(name: impl Into<String>, backend: impl Into<String>) -> Result<Self> {
        let layer = Self {
            name: name.into(),
            backend: backend.into(),
        };
        ensure_name("layer name", &layer.name)?;
        ensure_name("layer backend", &layer.backend)?;
        Ok(layer)
    }

    /// True for layers offloaded to the accelerator rather than run by the
    /// default backend.
    pub fn is_offloaded(&self) -> bool {
        self.backend != DEFAULT_LAYER_BACKEND
    }
}

/// Memory layout tag of an input or output tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum TensorFormat {
    #[default]
    Unknown = 0,
    Nchw = 1,
    Nhwc = 2,
}

/// Description of one input or output tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoTensorSpec {
    pub name: String,
    pub format: TensorFormat,
    pub ndim: usize,
    pub shape: Vec<i64>,
    /// Type of the data the caller supplies.
    pub datatype: DataType,
    /// Type the model computes in.
    pub model_datatype: DataType,
    /// `real = scale * quantized`.
    pub scale: f32,
    pub device: Device,
}

impl IoTensorSpec {
    /// Description with the defaults assigned to runtime-derived tensors: 32-bit
    /// float on both sides and identity scale.
    pub fn new(name: impl Into<String>, shape: Vec<i64>, device: Device) -> Result<Self> {
        let name = name.into();
        ensure_name("tensor name", &name)?;
        ensure_capacity("tensor rank", shape.len(), SHAPE_DIM_MAX)?;
        Ok(Self {
            name,
            format: TensorFormat::Unknown,
            ndim: shape.len(),
            shape,
            datatype: DataType::F32,
            model_datatype: DataType::F32,
            scale: 1.0,
            device,
        })
    }

    /// Number of elements, or `None` if the shape has negative (dynamic) dims.
    pub fn num_elements(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &d| {
            usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
        })
    }

    /// Buffer size in bytes of the caller-side tensor.
    pub fn size_bytes(&self) -> Option<usize> {
        self.num_elements()?.checked_mul(self.datatype.size_bytes())
    }
}
