// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Transient staging of the compiled code module.
//!
//! The runtime only loads modules from a filesystem path, while the driver
//! hands us a byte buffer. The buffer is written to an exclusively owned
//! temporary file that is removed when the [`StagedModule`] drops, on
//! success and on every error path alike.

use std::io::{Seek, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::registry::ModelId;
use crate::error::{Result, TvmdpError};

/// Code module written to a path-addressable temporary file.
pub struct StagedModule {
    file: NamedTempFile,
}

impl StagedModule {
    /// Create the staging file in `dir`, write `code` and rewind it.
    pub fn create(dir: &Path, model_id: ModelId, code: &[u8]) -> Result<Self> {
        let prefix = format!("tvmdp-{}-{}-", std::process::id(), model_id);
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".so")
            .tempfile_in(dir)
            .map_err(|e| {
                TvmdpError::ResourceExhausted(format!(
                    "cannot create staging file in {}: {e}",
                    dir.display()
                ))
            })?;

        file.write_all(code)?;
        file.flush()?;
        file.rewind()?;

        tracing::debug!(
            %model_id,
            path = %file.path().display(),
            bytes = code.len(),
            "code module staged"
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
