//! Clustreg: cluster-routed regression library
//!
//! Trains one pipeline per output target (missing-value handling, feature
//! selection, scaling, k-means clustering and a per-cluster model search) and
//! serves predictions by routing each row to its cluster's regressor.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod search;
pub mod utils;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
