//! JSON training report written next to each generation
//!
//! Records, per target, what the missing-value pass and the feature selector
//! removed, the elbow curve behind the chosen cluster count and every family's
//! scores per cluster.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::RegressorFamily;
use crate::pipeline::artifacts::finite;
use crate::pipeline::selection::DropEntry;
use crate::search::FamilyScore;

/// One family's result inside a cluster
#[derive(Debug, Clone, Serialize)]
pub struct FamilyReportEntry {
    pub family: RegressorFamily,
    pub hyperparameters: String,
    pub cv_score: Option<f64>,
    pub test_score: Option<f64>,
}

impl From<&FamilyScore> for FamilyReportEntry {
    fn from(score: &FamilyScore) -> Self {
        Self {
            family: score.family,
            hyperparameters: score.hyperparameters.describe(),
            cv_score: finite(score.cv_score),
            test_score: finite(score.test_score),
        }
    }
}

/// Search result for one cluster
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub cluster: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub winner: RegressorFamily,
    pub families: Vec<FamilyReportEntry>,
}

impl ClusterReport {
    /// The winning family's entry
    pub fn winner_entry(&self) -> Option<&FamilyReportEntry> {
        self.families.iter().find(|f| f.family == self.winner)
    }
}

/// Training record for one target
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub rows: usize,
    pub input_features: usize,
    pub dropped_missing: Vec<String>,
    pub imputed: Vec<String>,
    pub drop_entries: Vec<DropEntry>,
    pub drop_list_size: usize,
    pub features_used: usize,
    pub k: usize,
    pub inertia_curve: Vec<f64>,
    pub clusters: Vec<ClusterReport>,
}

/// Full report for one training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub timestamp: String,
    pub crate_version: String,
    pub generation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    pub config: PipelineConfig,
    pub targets: Vec<TargetReport>,
}

impl TrainingReport {
    pub fn new(
        generation_id: &str,
        input_file: Option<&Path>,
        config: &PipelineConfig,
        targets: Vec<TargetReport>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            generation_id: generation_id.to_string(),
            input_file: input_file.map(|p| p.display().to_string()),
            config: config.clone(),
            targets,
        }
    }

    /// Write the report as pretty JSON
    pub fn export(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Hyperparameters;

    #[test]
    fn test_non_finite_scores_become_null() {
        let score = FamilyScore {
            family: RegressorFamily::Ridge,
            hyperparameters: Hyperparameters::Ridge { alpha: 1.0 },
            cv_score: f64::NAN,
            test_score: 0.5,
        };
        let entry = FamilyReportEntry::from(&score);
        assert_eq!(entry.cv_score, None);
        assert_eq!(entry.test_score, Some(0.5));
    }

    #[test]
    fn test_report_serializes_metadata() {
        let report = TrainingReport::new("gen-1", None, &PipelineConfig::default(), Vec::new());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"generation_id\":\"gen-1\""));
        assert!(json.contains("crate_version"));
        assert!(!json.contains("input_file"));
    }
}
