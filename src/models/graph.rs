// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Topology description parsing and Stage 1 (structural) metadata.
//!
//! The topology is the graph executor JSON emitted by the tensor compiler.
//! Only the `nodes` array is read: each node has an `op`, a `name` and
//! optional `attrs`. Placeholder nodes (`op: "null"`) are graph inputs or
//! weights; compiled subgraphs (`op: "tvm_op"`) become layers.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::metadata::{ensure_capacity, LayerInfo, ModelMetadata, DEFAULT_LAYER_BACKEND, LAYERS_MAX};
use crate::error::{Result, TvmdpError};

/// Operation tag of a compiled subgraph node.
pub const COMPILED_SUBGRAPH_OP: &str = "tvm_op";
/// Operation tag of a placeholder (input or parameter) node.
pub const PLACEHOLDER_OP: &str = "null";

/// Parsed topology description.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphJson {
    pub nodes: Vec<GraphNode>,
}

/// One node of the topology.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphNode {
    pub op: String,
    pub name: String,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl GraphNode {
    pub fn is_placeholder(&self) -> bool {
        self.op == PLACEHOLDER_OP
    }

    pub fn is_compiled_subgraph(&self) -> bool {
        self.op == COMPILED_SUBGRAPH_OP
    }

    /// External compiler named by `attrs.Compiler`, if any.
    ///
    /// Accepts both a plain string and the nested-list encoding some
    /// exporters use (`[["mrvl"]]`).
    pub fn compiler(&self) -> Option<&str> {
        fn first_str(v: &Value) -> Option<&str> {
            match v {
                Value::String(s) => Some(s.as_str()),
                Value::Array(items) => items.first().and_then(first_str),
                _ => None,
            }
        }
        self.attrs.get("Compiler").and_then(first_str)
    }

    /// Backend tag for this node as a layer.
    pub fn backend(&self) -> &str {
        self.compiler().unwrap_or(DEFAULT_LAYER_BACKEND)
    }
}

impl GraphJson {
    /// Parse a topology buffer.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        serde_json::from_slice(buffer).map_err(|e| TvmdpError::Parse(e.to_string()))
    }

    /// Placeholder nodes in topology order.
    pub fn placeholders(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.is_placeholder())
    }

    /// Compiled subgraph nodes in topology order.
    pub fn compiled_subgraphs(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.is_compiled_subgraph())
    }

    /// Layer list: one entry per compiled subgraph.
    pub fn layers(&self) -> Result<Vec<LayerInfo>> {
        ensure_capacity("layers", self.compiled_subgraphs().count(), LAYERS_MAX)?;
        self.compiled_subgraphs()
            .map(|n| LayerInfo::new(n.name.clone(), n.backend()))
            .collect()
    }

    /// Stage 1 metadata for this topology. Name and version are left empty.
    pub fn structural_metadata(&self) -> Result<ModelMetadata> {
        let mut metadata = ModelMetadata::default();
        metadata.model.layers = self.layers()?;
        Ok(metadata)
    }
}

/// Stage 1 extraction on a caller-owned topology buffer.
///
/// Independent of any slot and of the runtime; usable before `load`.
pub fn extract_structural(buffer: &[u8]) -> Result<ModelMetadata> {
    let metadata = GraphJson::parse(buffer)?.structural_metadata()?;
    tracing::debug!(layers = metadata.model.layers.len(), "structural metadata extracted");
    Ok(metadata)
}
