//! Error types for mdof-io

use mdof_model::ModelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IoError {
    pub(crate) fn parse(file: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        IoError::Parse {
            file: file.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }
}
