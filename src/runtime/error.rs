//! Runtime lifecycle errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// No native inference capability in this build or on this host.
    #[error("Inference runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Model file not found: {0}")]
    NotFound(PathBuf),

    /// The native library refused the model or configuration.
    #[error("Model load failed: {0}")]
    Backend(String),

    /// The model is resident and cannot be removed.
    #[error("Model is loaded; unload it before deleting.")]
    Resident(i64),
}
