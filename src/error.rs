//! Error types for the training and serving pipeline

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::models::RegressorFamily;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Imputation, statistics or data-shape failure
    #[error("Data processing error: {0}")]
    DataProcessing(String),

    /// A transform or serving input lacks a column the fitted artifact expects
    #[error("Column '{column}' expected by the '{target}' artifacts is missing")]
    ColumnMismatch { target: String, column: String },

    /// The inertia curve has no detectable elbow
    #[error("No knee found in the inertia curve for target '{target}': {inertia:?}")]
    NoKneeFound { target: String, inertia: Vec<f64> },

    /// A regressor family failed to fit or score
    #[error("Model search failed for target '{target}', cluster {cluster}, family {family}: {reason}")]
    ModelSearchFailure {
        target: String,
        cluster: usize,
        family: RegressorFamily,
        reason: String,
    },

    /// No persisted regressor for the routed cluster
    #[error("No model registered for target '{target}', cluster {cluster}")]
    ArtifactNotFound { target: String, cluster: usize },

    /// Artifact store layout or content problem
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl PipelineError {
    /// Convenience constructor for data-processing failures
    pub fn data(message: impl Into<String>) -> Self {
        PipelineError::DataProcessing(message.into())
    }
}
