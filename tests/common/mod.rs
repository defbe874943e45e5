// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-process mock tensor runtime shared by the integration tests.
//!
//! The mock reads what a real runtime would need from the artifacts:
//! - code module: read back from the staged path at `load_module`
//! - topology: placeholder shapes from `attrs.shape`, output shapes from a
//!   top-level `outputs` list
//! - params: newline-separated parameter names
//!
//! `run` copies input 0 into output 0 through the bound raw pointers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tvmdp::config::ContextConfig;
use tvmdp::{
    ArtifactBundle, ArtifactDescriptor, Clock, Device, GraphExecutor, LayerBackend, RuntimeError,
    TensorMut, TensorRef, TensorRuntime, Tvmdp,
};

/// Observations and failure switches shared by a runtime and its executors.
#[derive(Debug, Default)]
pub struct MockState {
    pub staged_paths: Vec<PathBuf>,
    pub staged_code: Vec<Vec<u8>>,
    pub live_executors: usize,
    pub runs: usize,
    pub backends_seen: usize,
    pub fail_load_module: bool,
    pub fail_params: bool,
    pub fail_run: bool,
    pub fail_queries: bool,
}

#[derive(Clone, Default)]
pub struct MockRuntime {
    pub state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
    input_shapes: HashMap<String, Vec<i64>>,
    output_shapes: Vec<Vec<i64>>,
    params: HashSet<String>,
    inputs: Vec<(*const u8, usize)>,
    outputs: Vec<(*mut u8, usize)>,
}

// SAFETY: the bound pointers are only dereferenced inside `run`, on the
// thread that owns the executor at that time.
unsafe impl Send for MockExecutor {}

impl TensorRuntime for MockRuntime {
    type Module = Vec<u8>;
    type Executor = MockExecutor;

    fn load_module(&self, path: &Path) -> Result<Vec<u8>, RuntimeError> {
        let mut state = self.state();
        if state.fail_load_module {
            return Err(RuntimeError::new("module rejected"));
        }
        let code = std::fs::read(path).map_err(|e| RuntimeError::new(e.to_string()))?;
        state.staged_paths.push(path.to_path_buf());
        state.staged_code.push(code.clone());
        Ok(code)
    }

    fn create_executor(
        &self,
        graph_json: &str,
        _module: Vec<u8>,
        _device: Device,
        backend: Option<Arc<dyn LayerBackend>>,
    ) -> Result<MockExecutor, RuntimeError> {
        let graph: Value =
            serde_json::from_str(graph_json).map_err(|e| RuntimeError::new(e.to_string()))?;

        let mut input_shapes = HashMap::new();
        for node in graph["nodes"].as_array().into_iter().flatten() {
            if node["op"] == "null" {
                let name = node["name"].as_str().unwrap_or_default().to_string();
                input_shapes.insert(name, shape_of(&node["attrs"]["shape"]));
            }
        }
        let output_shapes = graph["outputs"]
            .as_array()
            .map(|shapes| shapes.iter().map(shape_of).collect())
            .unwrap_or_default();

        let mut state = self.state();
        state.live_executors += 1;
        if backend.is_some() {
            state.backends_seen += 1;
        }
        Ok(MockExecutor {
            state: Arc::clone(&self.state),
            input_shapes,
            output_shapes,
            params: HashSet::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        })
    }
}

fn shape_of(v: &Value) -> Vec<i64> {
    v.as_array()
        .map(|dims| dims.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_else(|| vec![1])
}

impl GraphExecutor for MockExecutor {
    fn load_params(&mut self, params: &[u8]) -> Result<(), RuntimeError> {
        if self.state.lock().unwrap().fail_params {
            return Err(RuntimeError::new("corrupt params"));
        }
        let text = std::str::from_utf8(params).map_err(|e| RuntimeError::new(e.to_string()))?;
        self.params = text.lines().filter(|l| !l.is_empty()).map(String::from).collect();
        Ok(())
    }

    fn contains_param(&self, name: &str) -> Result<bool, RuntimeError> {
        if self.state.lock().unwrap().fail_queries {
            return Err(RuntimeError::new("param map unavailable"));
        }
        Ok(self.params.contains(name))
    }

    fn num_outputs(&self) -> Result<usize, RuntimeError> {
        if self.state.lock().unwrap().fail_queries {
            return Err(RuntimeError::new("output count unavailable"));
        }
        Ok(self.output_shapes.len())
    }

    fn input_shape(&self, name: &str) -> tvmdp::Result<Vec<i64>> {
        self.input_shapes
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::new(format!("no input '{name}'")).into())
    }

    fn output_shape(&self, index: usize) -> tvmdp::Result<Vec<i64>> {
        self.output_shapes
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::new(format!("no output {index}")).into())
    }

    fn set_input_zero_copy(&mut self, index: usize, tensor: &TensorRef<'_>) -> Result<(), RuntimeError> {
        bind(&mut self.inputs, index, (tensor.as_ptr(), tensor.len()));
        Ok(())
    }

    fn set_output_zero_copy(
        &mut self,
        index: usize,
        tensor: &mut TensorMut<'_>,
    ) -> Result<(), RuntimeError> {
        if index >= self.output_shapes.len() {
            return Err(RuntimeError::new(format!("output index {index} out of range")));
        }
        bind(&mut self.outputs, index, (tensor.as_mut_ptr(), tensor.len()));
        Ok(())
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.runs += 1;
        if state.fail_run {
            return Err(RuntimeError::new("device fault"));
        }
        if let (Some(&(src, src_len)), Some(&(dst, dst_len))) = (self.inputs.first(), self.outputs.first()) {
            // SAFETY: both pointers were bound for this run and are valid
            // until it returns.
            unsafe { std::ptr::copy_nonoverlapping(src, dst, src_len.min(dst_len)) };
        }
        Ok(())
    }
}

fn bind<T: Copy>(slots: &mut Vec<T>, index: usize, value: T) {
    if slots.len() <= index {
        slots.resize(index + 1, value);
    }
    slots[index] = value;
}

impl Drop for MockExecutor {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.live_executors -= 1;
        }
    }
}

/// Clock advancing by a fixed step on every read.
pub struct StepClock {
    ticks: AtomicU64,
    step: u64,
}

impl StepClock {
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            ticks: AtomicU64::new(start),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> u64 {
        self.ticks.fetch_add(self.step, Ordering::Relaxed)
    }
}

/// Topology with one image input `x`, two weights and two compiled layers.
pub const GRAPH_JSON: &str = r#"{
    "nodes": [
        {"op": "null", "name": "x", "attrs": {"shape": [1, 4]}},
        {"op": "null", "name": "w0", "attrs": {"shape": [4, 4]}},
        {"op": "null", "name": "b0", "attrs": {"shape": [4]}},
        {"op": "tvm_op", "name": "L1", "attrs": {"Compiler": "mrvl"}},
        {"op": "tvm_op", "name": "L2"}
    ],
    "outputs": [[1, 4]]
}"#;

/// Owned artifacts for building bundles in tests.
pub struct Artifacts {
    pub code: Vec<u8>,
    pub topology: Vec<u8>,
    pub params: Vec<u8>,
}

impl Artifacts {
    pub fn sample() -> Self {
        Self {
            code: b"\x7fELF mock module".to_vec(),
            topology: GRAPH_JSON.as_bytes().to_vec(),
            params: b"w0\nb0\n".to_vec(),
        }
    }

    pub fn with_topology(mut self, topology: &str) -> Self {
        self.topology = topology.as_bytes().to_vec();
        self
    }

    pub fn bundle(&self) -> ArtifactBundle<'_> {
        ArtifactBundle::new(
            ArtifactDescriptor::new("mod.so", &self.code).unwrap(),
            ArtifactDescriptor::new("mod.json", &self.topology).unwrap(),
            ArtifactDescriptor::new("mod.params", &self.params).unwrap(),
        )
    }
}

/// Unconfigured context staging into `staging_dir`.
pub fn context(staging_dir: &Path) -> (Tvmdp<MockRuntime>, MockRuntime) {
    let runtime = MockRuntime::new();
    let config = ContextConfig {
        device: Device::cpu(0),
        staging_dir: staging_dir.to_path_buf(),
    };
    (Tvmdp::new(runtime.clone(), config), runtime)
}

/// Files currently in `dir`.
pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}
