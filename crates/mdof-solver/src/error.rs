//! Error types for mdof-solver

use mdof_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Record '{record}' has zero spectral acceleration at T = {period}")]
    DegenerateSpectrum { record: String, period: f64 },

    #[error("Eigenvalue analysis failed: {0}")]
    Eigen(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid IDA batch: {0}")]
    InvalidBatch(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
