//! Pipeline configuration
//!
//! Defaults reproduce the thresholds the pipeline has always trained with.
//! A JSON file can override any subset of fields; missing fields keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::search::grid::SVR_GRID_SIZE;

/// Missing-value handling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MissingConfig {
    /// Columns whose missing fraction exceeds this ratio are dropped instead of imputed
    pub drop_ratio: f64,
    /// Donor rows averaged per imputed value
    pub neighbors: usize,
    /// Suffix appended to a column name to form its missing-indicator column
    pub indicator_suffix: String,
}

impl Default for MissingConfig {
    fn default() -> Self {
        Self {
            drop_ratio: 0.75,
            neighbors: 3,
            indicator_suffix: "nan".to_string(),
        }
    }
}

/// Feature selection thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    pub mi_threshold: f64,
    pub mi_neighbors: usize,
    pub correlation_threshold: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mi_threshold: 0.1,
            mi_neighbors: 3,
            correlation_threshold: 0.8,
        }
    }
}

/// Cluster-count selection and k-means settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub max_k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    /// Kneedle sensitivity
    pub sensitivity: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_k: 10,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            sensitivity: 1.0,
        }
    }
}

/// Hyperparameter search settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub folds: usize,
    pub test_ratio: f64,
    /// Number of sampled regularization strengths for ridge and lasso
    pub n_alphas: usize,
    pub alpha_max: f64,
    /// Sampled candidates for the randomized searches, clamped to each grid
    pub svr_iter: usize,
    pub forest_iter: usize,
    pub boosting_iter: usize,
    /// Upper bound on boosting rounds, applied on top of the grid values
    pub max_boosting_rounds: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            test_ratio: 0.25,
            n_alphas: 50,
            alpha_max: 10.0,
            svr_iter: SVR_GRID_SIZE,
            forest_iter: 500,
            boosting_iter: 250,
            max_boosting_rounds: 1000,
        }
    }
}

impl SearchConfig {
    /// Small search space for fast runs and tests
    pub fn quick() -> Self {
        Self {
            folds: 3,
            test_ratio: 0.25,
            n_alphas: 5,
            alpha_max: 10.0,
            svr_iter: 3,
            forest_iter: 2,
            boosting_iter: 2,
            max_boosting_rounds: 60,
        }
    }
}

/// Top-level configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub id_column: String,
    pub targets: Vec<String>,
    pub seed: u64,
    pub missing: MissingConfig,
    pub selection: SelectionConfig,
    pub cluster: ClusterConfig,
    pub search: SearchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            id_column: "ID".to_string(),
            targets: vec!["Y1".to_string(), "Y2".to_string()],
            seed: 42,
            missing: MissingConfig::default(),
            selection: SelectionConfig::default(),
            cluster: ClusterConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration file, falling back to defaults for absent fields
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(PipelineError::Config("at least one target is required".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for target in &self.targets {
            if !seen.insert(target) {
                return Err(PipelineError::Config(format!("duplicate target '{}'", target)));
            }
            if target == &self.id_column {
                return Err(PipelineError::Config(format!(
                    "target '{}' cannot also be the id column",
                    target
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.missing.drop_ratio) {
            return Err(PipelineError::Config(format!(
                "missing.drop_ratio must be between 0.0 and 1.0, got {}",
                self.missing.drop_ratio
            )));
        }
        if self.missing.neighbors == 0 || self.selection.mi_neighbors == 0 {
            return Err(PipelineError::Config("neighbor counts must be at least 1".into()));
        }
        if self.missing.indicator_suffix.is_empty() {
            return Err(PipelineError::Config("missing.indicator_suffix cannot be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.selection.correlation_threshold) {
            return Err(PipelineError::Config(format!(
                "selection.correlation_threshold must be between 0.0 and 1.0, got {}",
                self.selection.correlation_threshold
            )));
        }
        if self.cluster.max_k < 3 {
            return Err(PipelineError::Config(format!(
                "cluster.max_k must be at least 3 for elbow detection, got {}",
                self.cluster.max_k
            )));
        }
        if self.cluster.n_init == 0 || self.cluster.max_iter == 0 {
            return Err(PipelineError::Config("cluster.n_init and cluster.max_iter must be positive".into()));
        }
        if self.search.folds < 2 {
            return Err(PipelineError::Config(format!(
                "search.folds must be at least 2, got {}",
                self.search.folds
            )));
        }
        if !(self.search.test_ratio > 0.0 && self.search.test_ratio < 1.0) {
            return Err(PipelineError::Config(format!(
                "search.test_ratio must be in (0, 1), got {}",
                self.search.test_ratio
            )));
        }
        if self.search.n_alphas == 0
            || self.search.svr_iter == 0
            || self.search.forest_iter == 0
            || self.search.boosting_iter == 0
        {
            return Err(PipelineError::Config("search candidate counts must be positive".into()));
        }
        Ok(())
    }
}
