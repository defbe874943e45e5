// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model management: artifacts, staging, slot registry and metadata.

mod artifact;
mod extract;
mod graph;
mod loader;
mod metadata;
mod registry;
mod staging;

pub use artifact::{ArtifactBundle, ArtifactDescriptor, ArtifactInfo, ArtifactSet, ArtifactSpan};
pub use extract::{default_model_name, output_name};
pub use graph::{extract_structural, GraphJson, GraphNode, COMPILED_SUBGRAPH_OP, PLACEHOLDER_OP};
pub use loader::ArtifactFiles;
pub use metadata::{
    IoTensorSpec, LayerInfo, ModelInfo, ModelMetadata, TensorFormat, DEFAULT_LAYER_BACKEND,
    INPUT_OUTPUT_MAX, LAYERS_MAX, NAME_MAX_LEN, SHAPE_DIM_MAX,
};
pub use registry::{ModelId, ModelLabel, ModelSlot, Registry, RunStats, SlotState};
pub use staging::StagedModule;

pub(crate) use registry::{out_of_range, LoadedModel};
#[cfg(feature = "ffi")]
pub(crate) use metadata::ensure_capacity;
