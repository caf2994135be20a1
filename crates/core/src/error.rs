use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TubepackError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Task failed: {reason}")]
    TaskFailed { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TubepackError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Errors reported by a transcript source for one video.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Transcript not available")]
    Unavailable,

    #[error("{reason}")]
    Provider { reason: String },
}

pub type Result<T> = std::result::Result<T, TubepackError>;
