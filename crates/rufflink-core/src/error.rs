//! Engine errors

use std::path::PathBuf;
use thiserror::Error;

use crate::version::{Operation, VersionRange};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(
        "{operation} requires Ruff {requirement}, but found {found} at {}",
        path.display()
    )]
    Capability {
        operation: Operation,
        requirement: VersionRange,
        found: semver::Version,
        path: PathBuf,
    },

    #[error("Ruff executable not found at {}", path.display())]
    ExecutableMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run {}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to determine Ruff version from {}: {output:?}", path.display())]
    InvalidVersion { path: PathBuf, output: String },

    #[error("Ruff exited with code {code}: {stderr}")]
    ToolFailure { code: i32, stderr: String },

    #[error("Unexpected Ruff output: {reason}")]
    MalformedOutput { reason: String },

    #[error("Failed to parse Ruff output")]
    Json(#[from] serde_json::Error),

    #[error("I/O error while running Ruff")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Errors the user should see as a notification rather than only in logs.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            EngineError::Capability { .. } | EngineError::ToolFailure { .. }
        )
    }

    /// The executable could not be found, run, or identified. Treated as
    /// "no findings" rather than a failure.
    pub fn is_missing_executable(&self) -> bool {
        matches!(
            self,
            EngineError::ExecutableMissing { .. }
                | EngineError::Spawn { .. }
                | EngineError::InvalidVersion { .. }
        )
    }

    /// The tool produced output that could not be interpreted.
    pub fn is_malformed_output(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedOutput { .. } | EngineError::Json(_)
        )
    }
}
