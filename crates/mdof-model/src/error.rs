//! Error types for mdof-model

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unsupported hysteretic model: {0}")]
    UnsupportedHystereticModel(String),

    #[error("Hysteretic model '{0}' requires backbone parameters")]
    MissingBackbone(String),

    #[error("Invalid structural parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid ground motion record '{id}': {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("Duplicate result row for record '{record}' at intensity {intensity}")]
    DuplicateRow { record: String, intensity: f64 },
}
