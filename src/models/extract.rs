// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stage 2 (runtime) metadata extraction for loaded models.

use super::graph::GraphNode;
use super::metadata::{ensure_capacity, IoTensorSpec, ModelMetadata, INPUT_OUTPUT_MAX};
use super::registry::{LoadedModel, ModelId};
use crate::error::Result;
use crate::runtime::{Device, GraphExecutor};

/// Name reported for a model loaded without an explicit one.
pub fn default_model_name(model_id: ModelId) -> String {
    format!("tvmdp_model_{model_id}")
}

/// Name reported for output `index`.
pub fn output_name(index: usize) -> String {
    format!("output_{index}")
}

/// True graph inputs: placeholders that are not keys of the parameter map.
pub(crate) fn graph_inputs<E: GraphExecutor>(model: &LoadedModel<E>) -> Result<Vec<&GraphNode>> {
    let mut inputs = Vec::new();
    for node in model.graph.placeholders() {
        if !model.executor.contains_param(&node.name)? {
            inputs.push(node);
        }
    }
    Ok(inputs)
}

pub(crate) fn runtime_metadata<E: GraphExecutor>(
    model_id: ModelId,
    model: &LoadedModel<E>,
    device: Device,
) -> Result<ModelMetadata> {
    let inputs = graph_inputs(model)?;
    ensure_capacity("inputs", inputs.len(), INPUT_OUTPUT_MAX)?;
    let num_output = model.executor.num_outputs()?;
    ensure_capacity("outputs", num_output, INPUT_OUTPUT_MAX)?;

    let input = inputs
        .iter()
        .map(|node| {
            let shape = model.executor.input_shape(&node.name)?;
            IoTensorSpec::new(node.name.clone(), shape, device)
        })
        .collect::<Result<Vec<_>>>()?;

    let output = (0..num_output)
        .map(|index| {
            let shape = model.executor.output_shape(index)?;
            IoTensorSpec::new(output_name(index), shape, device)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut metadata = ModelMetadata {
        input,
        output,
        ..ModelMetadata::default()
    };
    metadata.model.name = if model.label.name.is_empty() {
        default_model_name(model_id)
    } else {
        model.label.name.clone()
    };
    metadata.model.version = model.label.version.clone();
    metadata.model.num_input = metadata.input.len();
    metadata.model.num_output = metadata.output.len();

    tracing::debug!(
        %model_id,
        num_input = metadata.model.num_input,
        num_output = metadata.model.num_output,
        "runtime metadata extracted"
    );
    Ok(metadata)
}

pub(crate) fn full_metadata<E: GraphExecutor>(
    model_id: ModelId,
    model: &LoadedModel<E>,
    device: Device,
) -> Result<ModelMetadata> {
    let mut metadata = runtime_metadata(model_id, model, device)?;
    metadata.model.layers = model.graph.layers()?;
    Ok(metadata)
}
