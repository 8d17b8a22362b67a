//! Prediction routing
//!
//! Each target replays its training transforms on the serving table, assigns
//! every row to a cluster and hands it to that cluster's regressor. Failures are
//! scoped to the rows (or the target) they concern; the per-target predictions
//! are merged on row id with a full outer join.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ndarray::Axis;
use parking_lot::RwLock;
use polars::prelude::*;
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::pipeline::artifacts::{Generation, TargetArtifacts};
use crate::pipeline::loader::{feature_frame, row_ids, save_dataframe};

/// A row that received no prediction for one target
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub id: i64,
    pub target: String,
    pub reason: String,
}

/// Predictions for one target, keyed by row id
#[derive(Debug, Clone, Default)]
pub struct TargetPredictions {
    pub target: String,
    pub values: BTreeMap<i64, f64>,
    pub failures: Vec<RowFailure>,
}

/// Merged predictions for every target
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub id_column: String,
    pub targets: Vec<String>,
    /// One slot per target, in `targets` order; rows are sorted by id
    pub rows: BTreeMap<i64, Vec<Option<f64>>>,
    pub failures: Vec<RowFailure>,
    /// Rows in the serving table
    pub input_rows: usize,
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl PredictionResult {
    /// Full outer join of the per-target streams on row id
    pub fn merge(id_column: &str, input_rows: usize, per_target: Vec<TargetPredictions>) -> Self {
        let targets: Vec<String> = per_target.iter().map(|t| t.target.clone()).collect();
        let mut rows: BTreeMap<i64, Vec<Option<f64>>> = BTreeMap::new();
        let mut failures = Vec::new();

        for (slot, predictions) in per_target.into_iter().enumerate() {
            for (id, value) in predictions.values {
                rows.entry(id).or_insert_with(|| vec![None; targets.len()])[slot] =
                    Some(round2(value));
            }
            failures.extend(predictions.failures);
        }

        Self {
            id_column: id_column.to_string(),
            targets,
            rows,
            failures,
            input_rows,
        }
    }

    /// Prediction for one (row, target) pair
    pub fn get(&self, id: i64, target: &str) -> Option<f64> {
        let slot = self.targets.iter().position(|t| t == target)?;
        self.rows.get(&id).and_then(|values| values[slot])
    }

    /// Number of rows that received a prediction for `target`
    pub fn predicted_count(&self, target: &str) -> usize {
        match self.targets.iter().position(|t| t == target) {
            Some(slot) => self.rows.values().filter(|v| v[slot].is_some()).count(),
            None => 0,
        }
    }

    pub fn failure_count(&self, target: &str) -> usize {
        self.failures.iter().filter(|f| f.target == target).count()
    }

    /// Id column followed by one nullable column per target
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let ids: Vec<i64> = self.rows.keys().copied().collect();
        let mut columns = vec![Column::new(self.id_column.as_str().into(), ids)];
        for (slot, target) in self.targets.iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.values().map(|v| v[slot]).collect();
            columns.push(Column::new(target.as_str().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Write the merged predictions as CSV or Parquet
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut df = self.to_dataframe()?;
        save_dataframe(&mut df, path)
    }
}

/// Routes serving rows through one immutable generation
#[derive(Debug, Clone)]
pub struct PredictionRouter {
    generation: Arc<Generation>,
}

impl PredictionRouter {
    pub fn new(generation: Arc<Generation>) -> Self {
        Self { generation }
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Predict every target for the rows of `df`.
    ///
    /// Target columns in `df` are ignored. Only an unusable id column fails the
    /// whole call; everything else is reported per row in the result.
    pub fn predict(&self, df: &DataFrame) -> Result<PredictionResult> {
        let config = &self.generation.manifest.config;
        let ids = row_ids(df, &config.id_column)?;
        let features = feature_frame(df, &config.id_column, &config.targets)?;

        let per_target: Vec<TargetPredictions> = self
            .generation
            .targets
            .par_iter()
            .map(|artifacts| predict_target(artifacts, &ids, &features))
            .collect();

        let result = PredictionResult::merge(&config.id_column, df.height(), per_target);
        tracing::info!(
            generation = %self.generation.id(),
            rows = df.height(),
            predicted = result.rows.len(),
            failures = result.failures.len(),
            "prediction complete"
        );
        Ok(result)
    }
}

fn fail_all(target: &str, ids: &[i64], error: &PipelineError) -> Vec<RowFailure> {
    ids.iter()
        .map(|&id| RowFailure {
            id,
            target: target.to_string(),
            reason: error.to_string(),
        })
        .collect()
}

/// Run one target's transforms and regressors over the serving rows
pub fn predict_target(artifacts: &TargetArtifacts, ids: &[i64], features: &DataFrame) -> TargetPredictions {
    let target = artifacts.target.as_str();
    let mut out = TargetPredictions {
        target: target.to_string(),
        ..Default::default()
    };

    let scaled = artifacts
        .missing
        .apply(features)
        .map(|frame| artifacts.drop_list.apply(&frame))
        .and_then(|frame| artifacts.scaler.transform_matrix(&frame));
    let scaled = match scaled {
        Ok(matrix) => matrix,
        Err(e) => {
            tracing::warn!(target_name = target, error = %e, "target skipped for this table");
            out.failures = fail_all(target, ids, &e);
            return out;
        }
    };

    let (valid, invalid): (Vec<usize>, Vec<usize>) = (0..scaled.nrows())
        .partition(|&i| scaled.row(i).iter().all(|v| v.is_finite()));
    for &i in &invalid {
        out.failures.push(RowFailure {
            id: ids[i],
            target: target.to_string(),
            reason: "non-finite feature value after scaling".to_string(),
        });
    }
    if valid.is_empty() {
        return out;
    }

    let x = scaled.select(Axis(0), &valid);
    let labels = match artifacts.cluster_model.predict(&x) {
        Ok(labels) => labels,
        Err(e) => {
            let valid_ids: Vec<i64> = valid.iter().map(|&i| ids[i]).collect();
            out.failures.extend(fail_all(target, &valid_ids, &e));
            return out;
        }
    };

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (pos, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(pos);
    }

    for (cluster, positions) in groups {
        let group_ids: Vec<i64> = positions.iter().map(|&p| ids[valid[p]]).collect();
        let entry = match artifacts.models.get(&cluster) {
            Some(entry) => entry,
            None => {
                let e = PipelineError::ArtifactNotFound {
                    target: target.to_string(),
                    cluster,
                };
                tracing::warn!(target_name = target, cluster, rows = group_ids.len(), "no model for cluster");
                out.failures.extend(fail_all(target, &group_ids, &e));
                continue;
            }
        };

        let group_x = x.select(Axis(0), &positions);
        match entry.model.predict(&group_x) {
            Ok(pred) => {
                for (&id, &value) in group_ids.iter().zip(pred.iter()) {
                    if value.is_finite() {
                        out.values.insert(id, value);
                    } else {
                        out.failures.push(RowFailure {
                            id,
                            target: target.to_string(),
                            reason: "regressor returned a non-finite value".to_string(),
                        });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(target_name = target, cluster, error = %e, "regressor failed");
                out.failures.extend(fail_all(target, &group_ids, &e));
            }
        }
    }

    out
}

/// Serves the live generation and swaps in a newly committed one.
///
/// Readers take a cheap `Arc` clone, so a swap never affects requests that
/// already hold the previous generation.
#[derive(Debug)]
pub struct GenerationHandle {
    current: RwLock<Arc<Generation>>,
}

impl GenerationHandle {
    pub fn new(generation: Generation) -> Self {
        Self {
            current: RwLock::new(Arc::new(generation)),
        }
    }

    pub fn current(&self) -> Arc<Generation> {
        Arc::clone(&self.current.read())
    }

    /// Replace the live generation, returning the previous one
    pub fn swap(&self, generation: Generation) -> Arc<Generation> {
        let next = Arc::new(generation);
        let mut guard = self.current.write();
        tracing::info!(from = %guard.id(), to = %next.id(), "generation swapped");
        std::mem::replace(&mut *guard, next)
    }

    pub fn router(&self) -> PredictionRouter {
        PredictionRouter::new(self.current())
    }
}
