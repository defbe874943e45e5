// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inspect CLI subcommands: structural metadata of compiled models.
//!
//! Runs Stage-1 extraction only. No runtime is involved, so these work on
//! any host that can read the artifacts.

use std::path::Path;

use super::{EXIT_FAILED, EXIT_OK};
use crate::error::Result;
use crate::models::{extract_structural, ArtifactFiles, ModelMetadata};

/// Run `inspect <graph.json>`.
///
/// Returns exit code: 0 on success, 2 on read or parse failure.
pub fn run_inspect(path: &Path) -> u8 {
    report(inspect_file(path))
}

/// Run `inspect-dir <model_dir>`.
///
/// Returns exit code: 0 on success, 2 on read or parse failure.
pub fn run_inspect_dir(dir: &Path) -> u8 {
    report(inspect_dir(dir))
}

pub fn inspect_file(path: &Path) -> Result<ModelMetadata> {
    let buffer = std::fs::read(path)?;
    extract_structural(&buffer)
}

pub fn inspect_dir(dir: &Path) -> Result<ModelMetadata> {
    let files = ArtifactFiles::open(dir)?;
    extract_structural(files.topology())
}

fn report(result: Result<ModelMetadata>) -> u8 {
    let metadata = match result {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_FAILED;
        }
    };
    match serde_json::to_string_pretty(&metadata) {
        Ok(text) => {
            println!("{text}");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FAILED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TvmdpError;

    const GRAPH: &str = r#"{"nodes": [
        {"op": "null", "name": "x"},
        {"op": "tvm_op", "name": "L1", "attrs": {"Compiler": "mrvl"}},
        {"op": "tvm_op", "name": "L2"}
    ]}"#;

    #[test]
    fn test_inspect_file_lists_layers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, GRAPH).unwrap();

        let metadata = inspect_file(&path).unwrap();
        let layers: Vec<_> = metadata
            .model
            .layers
            .iter()
            .map(|l| (l.name.as_str(), l.backend.as_str()))
            .collect();
        assert_eq!(layers, [("L1", "mrvl"), ("L2", "llvm")]);
        assert_eq!(run_inspect(&path), EXIT_OK);
    }

    #[test]
    fn test_inspect_dir_uses_topology() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.so"), b"code").unwrap();
        std::fs::write(dir.path().join("m.json"), GRAPH).unwrap();
        std::fs::write(dir.path().join("m.params"), b"p").unwrap();

        let metadata = inspect_dir(dir.path()).unwrap();
        assert_eq!(metadata.model.layers.len(), 2);
    }

    #[test]
    fn test_inspect_garbage_exits_2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, b"not json").unwrap();

        assert!(matches!(inspect_file(&path), Err(TvmdpError::Parse(_))));
        assert_eq!(run_inspect(&path), EXIT_FAILED);
        assert_eq!(run_inspect(&dir.path().join("missing.json")), EXIT_FAILED);
    }
}
