// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Artifact bundles: the three compiled blobs that make up one model.
//!
//! Buffers are caller-owned and only borrowed; a slot keeps an owned
//! [`ArtifactSet`] describing them, never the bytes.

use serde::Serialize;

use super::metadata::NAME_MAX_LEN;
use crate::error::{Result, TvmdpError};

/// One borrowed artifact: a named byte range of a caller-owned buffer.
#[derive(Debug, Clone)]
pub struct ArtifactDescriptor<'a> {
    name: String,
    offset: u64,
    data: &'a [u8],
}

impl<'a> ArtifactDescriptor<'a> {
    pub fn new(name: impl Into<String>, data: &'a [u8]) -> Result<Self> {
        let name = name.into();
        if name.len() > NAME_MAX_LEN {
            return Err(TvmdpError::InvalidArgument(format!(
                "artifact name '{name}' longer than {NAME_MAX_LEN} bytes"
            )));
        }
        Ok(Self { name, offset: 0, data })
    }

    /// Record the offset of this artifact inside its combined container.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            name: self.name.clone(),
            size: self.size(),
            offset: self.offset,
        }
    }
}

/// Location of an artifact inside a combined container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpan {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

impl ArtifactSpan {
    pub fn new(name: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
        }
    }
}

/// Owned copy of an artifact descriptor, kept by the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub size: u64,
    pub offset: u64,
}

/// Owned descriptors of a loaded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    pub code: ArtifactInfo,
    pub topology: ArtifactInfo,
    pub params: ArtifactInfo,
}

/// Code module, topology description and parameter blob of one model.
#[derive(Debug, Clone)]
pub struct ArtifactBundle<'a> {
    pub code: ArtifactDescriptor<'a>,
    pub topology: ArtifactDescriptor<'a>,
    pub params: ArtifactDescriptor<'a>,
}

impl<'a> ArtifactBundle<'a> {
    pub fn new(
        code: ArtifactDescriptor<'a>,
        topology: ArtifactDescriptor<'a>,
        params: ArtifactDescriptor<'a>,
    ) -> Self {
        Self { code, topology, params }
    }

    /// Resolve `[code, topology, params]` spans inside one container buffer.
    pub fn from_container(container: &'a [u8], spans: [ArtifactSpan; 3]) -> Result<Self> {
        let [code, topology, params] = spans.map(|span| resolve_span(container, span));
        Ok(Self::new(code?, topology?, params?))
    }

    /// Reject bundles the runtime could never load.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.code.data.is_empty() {
            return Err(TvmdpError::InvalidArgument("empty code artifact".into()));
        }
        if self.topology.data.is_empty() {
            return Err(TvmdpError::InvalidArgument("empty topology artifact".into()));
        }
        Ok(())
    }

    /// Topology as UTF-8 text.
    pub fn topology_str(&self) -> Result<&'a str> {
        std::str::from_utf8(self.topology.data)
            .map_err(|e| TvmdpError::Parse(format!("topology is not UTF-8: {e}")))
    }

    pub fn info(&self) -> ArtifactSet {
        ArtifactSet {
            code: self.code.info(),
            topology: self.topology.info(),
            params: self.params.info(),
        }
    }
}

fn resolve_span<'a>(container: &'a [u8], span: ArtifactSpan) -> Result<ArtifactDescriptor<'a>> {
    let out_of_bounds = || {
        TvmdpError::InvalidArgument(format!(
            "artifact '{}' [{}..+{}] outside container of {} bytes",
            span.name,
            span.offset,
            span.size,
            container.len()
        ))
    };
    let start = usize::try_from(span.offset).map_err(|_| out_of_bounds())?;
    let len = usize::try_from(span.size).map_err(|_| out_of_bounds())?;
    let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
    let data = container.get(start..end).ok_or_else(out_of_bounds)?;
    Ok(ArtifactDescriptor::new(span.name, data)?.with_offset(span.offset))
}
