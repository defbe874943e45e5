// Copyright 2024-2026 TVMDP Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for TVMDP.
//!
//! All errors are reported synchronously by the operation that detects
//! them. Codes handed across the C boundary (and written into inference
//! result sinks) are negative errno values, `0` meaning success.

use thiserror::Error;

use crate::models::ModelId;
use crate::runtime::RuntimeError;

/// errno values used by the return convention.
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const ENOSPC: i32 = 28;
    pub const EBADMSG: i32 = 74;
}

/// Errors produced by the slot lifecycle, metadata extraction and dispatch.
#[derive(Debug, Error)]
pub enum TvmdpError {
    #[error("Registry not configured")]
    NotConfigured,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Model {0} already loaded")]
    AlreadyLoaded(ModelId),

    #[error("Model {0} not loaded")]
    NotLoaded(ModelId),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid topology description: {0}")]
    Parse(String),

    #[error("Cannot close registry: {active} model(s) still loaded")]
    SlotsStillActive { active: usize },

    #[error("Capacity exceeded for {what}: {len} > {max}")]
    CapacityExceeded {
        what: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TvmdpError {
    /// Negative errno-style code for this error.
    pub fn errno(&self) -> i32 {
        let code = match self {
            Self::NotConfigured => errno::EPERM,
            Self::InvalidArgument(_) => errno::EINVAL,
            Self::AlreadyLoaded(_) => errno::EEXIST,
            Self::NotLoaded(_) => errno::ENOENT,
            Self::ResourceExhausted(_) => errno::ENOMEM,
            Self::Parse(_) => errno::EBADMSG,
            Self::SlotsStillActive { .. } => errno::EBUSY,
            Self::CapacityExceeded { .. } => errno::ENOSPC,
            Self::Runtime(_) | Self::Io(_) => errno::EIO,
        };
        -code
    }

    /// Returns true if the error reflects caller misuse of the state machine
    /// rather than a failure of an external collaborator.
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured
                | Self::AlreadyLoaded(_)
                | Self::NotLoaded(_)
                | Self::SlotsStillActive { .. }
        )
    }
}

impl From<serde_json::Error> for TvmdpError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TvmdpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_codes_are_negative() {
        let errors = [
            TvmdpError::NotConfigured,
            TvmdpError::InvalidArgument("x".into()),
            TvmdpError::AlreadyLoaded(ModelId::new(0)),
            TvmdpError::NotLoaded(ModelId::new(1)),
            TvmdpError::ResourceExhausted("x".into()),
            TvmdpError::Parse("x".into()),
            TvmdpError::SlotsStillActive { active: 1 },
            TvmdpError::CapacityExceeded { what: "layers", len: 33, max: 32 },
            TvmdpError::Runtime(RuntimeError::new("boom")),
        ];
        for e in &errors {
            assert!(e.errno() < 0, "{e} must map to a negative code");
        }
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(TvmdpError::InvalidArgument("zero".into()).errno(), -22);
        assert_eq!(TvmdpError::ResourceExhausted("oom".into()).errno(), -12);
        assert_eq!(TvmdpError::SlotsStillActive { active: 2 }.errno(), -16);
        assert_eq!(TvmdpError::AlreadyLoaded(ModelId::new(3)).errno(), -17);
    }

    #[test]
    fn test_state_violation_classification() {
        assert!(TvmdpError::NotConfigured.is_state_violation());
        assert!(TvmdpError::NotLoaded(ModelId::new(0)).is_state_violation());
        assert!(!TvmdpError::Parse("bad".into()).is_state_violation());
        assert!(!TvmdpError::Runtime(RuntimeError::new("x")).is_state_violation());
    }

    #[test]
    fn test_json_error_becomes_parse_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: TvmdpError = err.into();
        assert!(matches!(e, TvmdpError::Parse(_)));
        assert_eq!(e.errno(), -errno::EBADMSG);
    }
}
