// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Artifact directories mapped into memory.
//!
//! A compiled model directory holds exactly one `*.so` code module, one
//! `*.json` topology description and one `*.params` parameter blob. The
//! files are memory-mapped so bundles built from them borrow the mappings
//! without copying.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::artifact::{ArtifactBundle, ArtifactDescriptor};
use crate::error::{Result, TvmdpError};

const CODE_EXT: &str = "so";
const TOPOLOGY_EXT: &str = "json";
const PARAMS_EXT: &str = "params";

/// One memory-mapped artifact file.
struct MappedArtifact {
    path: PathBuf,
    mmap: Mmap,
}

impl MappedArtifact {
    fn open(path: PathBuf) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: File is opened read-only; artifact files are not modified
        // while a bundle borrows the mapping.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { path, mmap })
    }

    fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    fn descriptor(&self) -> Result<ArtifactDescriptor<'_>> {
        ArtifactDescriptor::new(self.file_name(), &self.mmap)
    }
}

/// Memory-mapped artifact directory.
pub struct ArtifactFiles {
    dir: PathBuf,
    code: MappedArtifact,
    topology: MappedArtifact,
    params: MappedArtifact,
}

impl ArtifactFiles {
    /// Locate and map the three artifacts in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut code = None;
        let mut topology = None;
        let mut params = None;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let slot = match path.extension().and_then(|e| e.to_str()) {
                Some(CODE_EXT) => &mut code,
                Some(TOPOLOGY_EXT) => &mut topology,
                Some(PARAMS_EXT) => &mut params,
                _ => continue,
            };
            if let Some(previous) = slot.replace(path.clone()) {
                return Err(TvmdpError::InvalidArgument(format!(
                    "ambiguous artifacts in {}: {} and {}",
                    dir.display(),
                    previous.display(),
                    path.display()
                )));
            }
        }

        let require = |path: Option<PathBuf>, ext: &str| {
            path.ok_or_else(|| {
                TvmdpError::InvalidArgument(format!("no *.{ext} artifact in {}", dir.display()))
            })
        };

        let files = Self {
            dir: dir.to_path_buf(),
            code: MappedArtifact::open(require(code, CODE_EXT)?)?,
            topology: MappedArtifact::open(require(topology, TOPOLOGY_EXT)?)?,
            params: MappedArtifact::open(require(params, PARAMS_EXT)?)?,
        };
        tracing::debug!(
            dir = %files.dir.display(),
            code_bytes = files.code.mmap.len(),
            topology_bytes = files.topology.mmap.len(),
            params_bytes = files.params.mmap.len(),
            "artifact directory mapped"
        );
        Ok(files)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Topology bytes (for Stage 1 extraction without a bundle).
    pub fn topology(&self) -> &[u8] {
        &self.topology.mmap
    }

    /// Bundle borrowing the mapped files.
    pub fn bundle(&self) -> Result<ArtifactBundle<'_>> {
        Ok(ArtifactBundle::new(
            self.code.descriptor()?,
            self.topology.descriptor()?,
            self.params.descriptor()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: &[u8]) {
        std::fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn test_open_maps_all_three() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "mod.so", b"\x7fELF");
        write(dir.path(), "mod.json", br#"{"nodes": []}"#);
        write(dir.path(), "mod.params", b"weights");
        write(dir.path(), "README.txt", b"ignored");

        let files = ArtifactFiles::open(dir.path()).unwrap();
        let bundle = files.bundle().unwrap();
        assert_eq!(bundle.code.name(), "mod.so");
        assert_eq!(bundle.code.data(), b"\x7fELF");
        assert_eq!(bundle.topology_str().unwrap(), r#"{"nodes": []}"#);
        assert_eq!(bundle.params.size(), 7);
        assert_eq!(files.topology(), br#"{"nodes": []}"#);
    }

    #[test]
    fn test_missing_params_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "mod.so", b"x");
        write(dir.path(), "mod.json", b"{}");
        let err = ArtifactFiles::open(dir.path()).err().unwrap();
        assert!(matches!(err, TvmdpError::InvalidArgument(ref m) if m.contains("params")));
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.so", b"x");
        write(dir.path(), "b.so", b"y");
        write(dir.path(), "mod.json", b"{}");
        write(dir.path(), "mod.params", b"");
        let err = ArtifactFiles::open(dir.path()).err().unwrap();
        assert!(matches!(err, TvmdpError::InvalidArgument(ref m) if m.contains("ambiguous")));
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let err = ArtifactFiles::open(Path::new("/nonexistent/tvmdp-model")).err().unwrap();
        assert!(matches!(err, TvmdpError::Io(_)));
    }
}
