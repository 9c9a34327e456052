//! Crate-level error type.
//!
//! Wraps the per-module errors so a controller can report why the pipeline
//! stopped with a single type.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::rcon::RconError;
use crate::source::SourceError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Remote console error: {0}")]
    Console(#[from] RconError),

    #[error("Command source error: {0}")]
    Source(#[from] SourceError),

    /// A pipeline task panicked or was aborted
    #[error("Pipeline task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },
}

impl RelayError {
    pub fn task_failed(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskFailed {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Authentication failures are reported apart from transport failures
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Console(e) if e.is_authentication_failure())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
