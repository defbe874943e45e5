// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metadata extraction integration tests.
//!
//! Stage 1 on raw topology buffers, Stage 2 against a loaded mock model,
//! and the combined accessor.

mod common;

use common::{context, Artifacts, GRAPH_JSON};
use tvmdp::models::{ArtifactSpan, DEFAULT_LAYER_BACKEND, LAYERS_MAX};
use tvmdp::{
    extract_structural, ArtifactBundle, DataType, Device, DeviceHandle, LoadOptions, ModelId,
    MonotonicClock, TvmdpError,
};

fn layer_pairs(metadata: &tvmdp::ModelMetadata) -> Vec<(String, String)> {
    metadata
        .model
        .layers
        .iter()
        .map(|l| (l.name.clone(), l.backend.clone()))
        .collect()
}

// ============================================================================
// Stage 1
// ============================================================================

#[test]
fn test_structural_example_topology() {
    let buffer = br#"{"nodes": [
        {"op": "null", "name": "x"},
        {"op": "tvm_op", "name": "L1", "attrs": {"Compiler": "mrvl"}},
        {"op": "tvm_op", "name": "L2"}
    ]}"#;
    let metadata = extract_structural(buffer).unwrap();
    assert_eq!(
        layer_pairs(&metadata),
        vec![
            ("L1".to_string(), "mrvl".to_string()),
            ("L2".to_string(), DEFAULT_LAYER_BACKEND.to_string()),
        ]
    );
    assert!(metadata.input.is_empty());
    assert!(metadata.output.is_empty());
}

#[test]
fn test_structural_rejects_unparseable() {
    assert!(matches!(extract_structural(b"\x00\x01"), Err(TvmdpError::Parse(_))));
    assert!(matches!(extract_structural(br#"{"arg_nodes": [0]}"#), Err(TvmdpError::Parse(_))));
    assert!(matches!(extract_structural(br#"{"nodes": 3}"#), Err(TvmdpError::Parse(_))));
}

#[test]
fn test_structural_layer_capacity() {
    let nodes: Vec<String> = (0..=LAYERS_MAX)
        .map(|i| format!(r#"{{"op": "tvm_op", "name": "L{i}"}}"#))
        .collect();
    let buffer = format!(r#"{{"nodes": [{}]}}"#, nodes.join(","));
    let err = extract_structural(buffer.as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        TvmdpError::CapacityExceeded { len, max, .. } if len == LAYERS_MAX + 1 && max == LAYERS_MAX
    ));
}

#[test]
fn test_structural_from_container() {
    let mut container = b"CODE".to_vec();
    let topology_offset = container.len() as u64;
    container.extend_from_slice(GRAPH_JSON.as_bytes());
    let params_offset = container.len() as u64;
    container.extend_from_slice(b"w0\nb0\n");

    let bundle = ArtifactBundle::from_container(
        &container,
        [
            ArtifactSpan::new("mod.so", 0, 4),
            ArtifactSpan::new("mod.json", topology_offset, GRAPH_JSON.len() as u64),
            ArtifactSpan::new("mod.params", params_offset, 6),
        ],
    )
    .unwrap();
    assert_eq!(bundle.topology.offset(), topology_offset);
    let metadata = extract_structural(bundle.topology.data()).unwrap();
    assert_eq!(metadata.model.layers.len(), 2);
}

// ============================================================================
// Stage 2
// ============================================================================

#[test]
fn test_runtime_metadata_requires_loaded_slot() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctx, _) = context(dir.path());
    assert!(matches!(ctx.runtime_metadata(ModelId::new(0)), Err(TvmdpError::NotConfigured)));

    ctx.configure(2, MonotonicClock::new()).unwrap();
    assert!(matches!(
        ctx.runtime_metadata(ModelId::new(1)),
        Err(TvmdpError::NotLoaded(id)) if id == ModelId::new(1)
    ));
    assert!(matches!(ctx.metadata(ModelId::new(1)), Err(TvmdpError::NotLoaded(_))));
    assert!(matches!(ctx.metadata(ModelId::new(5)), Err(TvmdpError::InvalidArgument(_))));
}

#[test]
fn test_runtime_metadata_inputs_exclude_params() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctx, _) = context(dir.path());
    let artifacts = Artifacts::sample();
    ctx.configure(4, MonotonicClock::new()).unwrap();
    ctx.load(DeviceHandle(0), ModelId::new(2), &artifacts.bundle(), LoadOptions::new())
        .unwrap();

    let metadata = ctx.runtime_metadata(ModelId::new(2)).unwrap();
    assert_eq!(metadata.model.name, "tvmdp_model_2");
    assert_eq!(metadata.model.version, "");
    assert_eq!(metadata.model.num_input, 1);
    assert_eq!(metadata.model.num_output, 1);
    assert!(metadata.model.layers.is_empty(), "stage 2 does not scan layers");

    let input = &metadata.input[0];
    assert_eq!(input.name, "x");
    assert_eq!(input.ndim, 2);
    assert_eq!(input.shape, vec![1, 4]);
    assert_eq!(input.datatype, DataType::F32);
    assert_eq!(input.model_datatype, DataType::F32);
    assert_eq!(input.scale, 1.0);
    assert_eq!(input.device, Device::cpu(0));
    assert_eq!(metadata.output[0].name, "output_0");
    assert_eq!(metadata.output[0].shape, vec![1, 4]);
}

#[test]
fn test_runtime_query_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctx, runtime) = context(dir.path());
    let artifacts = Artifacts::sample();
    ctx.configure(1, MonotonicClock::new()).unwrap();
    ctx.load(DeviceHandle(0), ModelId::new(0), &artifacts.bundle(), LoadOptions::new())
        .unwrap();

    runtime.state().fail_queries = true;
    let err = ctx.runtime_metadata(ModelId::new(0)).unwrap_err();
    assert!(matches!(err, TvmdpError::Runtime(_)));
    assert_eq!(err.errno(), -5);
    assert!(matches!(ctx.metadata(ModelId::new(0)), Err(TvmdpError::Runtime(_))));

    runtime.state().fail_queries = false;
    assert_eq!(ctx.runtime_metadata(ModelId::new(0)).unwrap().model.num_input, 1);
}

#[test]
fn test_input_count_round_trip() {
    let topology = r#"{
        "nodes": [
            {"op": "null", "name": "a"},
            {"op": "null", "name": "b"},
            {"op": "null", "name": "p0"},
            {"op": "null", "name": "p1"},
            {"op": "null", "name": "p2"},
            {"op": "tvm_op", "name": "L"}
        ],
        "outputs": [[2], [3]]
    }"#;
    let mut artifacts = Artifacts::sample().with_topology(topology);
    // One name in the blob is not a placeholder and must not count.
    artifacts.params = b"p0\np1\np2\nunrelated\n".to_vec();

    let dir = tempfile::tempdir().unwrap();
    let (mut ctx, _) = context(dir.path());
    ctx.configure(1, MonotonicClock::new()).unwrap();
    ctx.load(DeviceHandle(0), ModelId::new(0), &artifacts.bundle(), LoadOptions::new())
        .unwrap();

    let metadata = ctx.runtime_metadata(ModelId::new(0)).unwrap();
    let placeholders = 5;
    let params_among_placeholders = 3;
    assert_eq!(metadata.model.num_input + params_among_placeholders, placeholders);
    let names: Vec<_> = metadata.input.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(metadata.model.num_output, 2);
    assert_eq!(metadata.output[1].name, "output_1");
    assert_eq!(metadata.output[1].shape, vec![3]);
}

#[test]
fn test_rank_over_capacity_rejected() {
    let topology = r#"{
        "nodes": [{"op": "null", "name": "x", "attrs": {"shape": [1,1,1,1,1,1,1,1,1]}}],
        "outputs": []
    }"#;
    let artifacts = Artifacts::sample().with_topology(topology);
    let dir = tempfile::tempdir().unwrap();
    let (mut ctx, _) = context(dir.path());
    ctx.configure(1, MonotonicClock::new()).unwrap();
    ctx.load(DeviceHandle(0), ModelId::new(0), &artifacts.bundle(), LoadOptions::new())
        .unwrap();

    let err = ctx.runtime_metadata(ModelId::new(0)).unwrap_err();
    assert!(matches!(err, TvmdpError::CapacityExceeded { len: 9, max: 8, .. }));
}

// ============================================================================
// Combined
// ============================================================================

#[test]
fn test_combined_metadata_uses_label() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctx, _) = context(dir.path());
    let artifacts = Artifacts::sample();
    ctx.configure(1, MonotonicClock::new()).unwrap();
    let options = LoadOptions::new().with_name("mobilenet").with_version("2.1");
    ctx.load(DeviceHandle(0), ModelId::new(0), &artifacts.bundle(), options).unwrap();

    let metadata = ctx.metadata(ModelId::new(0)).unwrap();
    assert_eq!(metadata.model.name, "mobilenet");
    assert_eq!(metadata.model.version, "2.1");
    assert_eq!(
        layer_pairs(&metadata),
        vec![
            ("L1".to_string(), "mrvl".to_string()),
            ("L2".to_string(), "llvm".to_string()),
        ]
    );
    assert_eq!(metadata.model.num_input, 1);
}

#[test]
fn test_combined_metadata_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctx, _) = context(dir.path());
    let artifacts = Artifacts::sample();
    ctx.configure(1, MonotonicClock::new()).unwrap();
    ctx.load(DeviceHandle(0), ModelId::new(0), &artifacts.bundle(), LoadOptions::new())
        .unwrap();

    let first = serde_json::to_vec(&ctx.metadata(ModelId::new(0)).unwrap()).unwrap();
    let second = serde_json::to_vec(&ctx.metadata(ModelId::new(0)).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_structural_matches_combined_layers() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctx, _) = context(dir.path());
    let artifacts = Artifacts::sample();
    let structural = extract_structural(&artifacts.topology).unwrap();

    ctx.configure(1, MonotonicClock::new()).unwrap();
    ctx.load(DeviceHandle(0), ModelId::new(0), &artifacts.bundle(), LoadOptions::new())
        .unwrap();
    let combined = ctx.metadata(ModelId::new(0)).unwrap();
    assert_eq!(structural.model.layers, combined.model.layers);
}
