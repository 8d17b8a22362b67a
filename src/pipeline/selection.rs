//! Feature selection producing the persisted drop list
//!
//! Three independent detectors feed the drop list: zero variance, low mutual
//! information with the target, and collinearity. The list is computed once per
//! target at training time and replayed verbatim afterwards.

use std::collections::BTreeSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SelectionConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::correlation::find_collinear_columns;
use crate::pipeline::loader::column_values;
use crate::pipeline::mutual_info::mutual_info_regression;

/// Set of column names removed before scaling, clustering and prediction.
///
/// Stored sorted so removal always happens in the same order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropList {
    columns: BTreeSet<String>,
}

impl DropList {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.columns.iter()
    }

    /// Remove the listed columns. Names absent from the table are ignored, so
    /// applying the list twice gives the same table as applying it once.
    pub fn apply(&self, df: &DataFrame) -> DataFrame {
        let present: Vec<&str> = self
            .columns
            .iter()
            .map(|s| s.as_str())
            .filter(|name| df.column(name).is_ok())
            .collect();
        df.drop_many(present.iter().copied())
    }
}

/// Why a column was put on the drop list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    ZeroVariance,
    LowRelevance { score: f64 },
    Collinear { with: String, correlation: f64 },
}

/// A drop list entry with its reason; a column can appear once per detector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DropEntry {
    pub column: String,
    pub reason: DropReason,
}

/// Detector outputs for one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub drop_list: DropList,
    pub entries: Vec<DropEntry>,
    /// Mutual information of every feature with the target, in column order
    pub relevance: Vec<(String, f64)>,
}

/// Columns whose sample standard deviation is exactly zero.
///
/// A column with fewer than two rows has no spread and counts as constant.
pub fn zero_variance_columns(df: &DataFrame) -> Result<Vec<String>> {
    let mut constant = Vec::new();
    for column in df.get_columns() {
        let values = column_values(column)?;
        let is_constant = match values.first() {
            None => true,
            Some(first) => values.len() < 2 || values.iter().all(|v| v == first),
        };
        if is_constant {
            constant.push(column.name().to_string());
        }
    }
    Ok(constant)
}

/// Mutual-information score of every column against the target
pub fn relevance_scores(
    df: &DataFrame,
    target: &[f64],
    n_neighbors: usize,
    seed: u64,
) -> Result<Vec<(String, f64)>> {
    if df.height() != target.len() {
        return Err(PipelineError::data(format!(
            "Feature table has {} rows but target has {}",
            df.height(),
            target.len()
        )));
    }

    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let features: Vec<Vec<f64>> = df
        .get_columns()
        .iter()
        .map(column_values)
        .collect::<Result<_>>()?;

    if let Some(idx) = features.iter().position(|f| f.iter().any(|v| v.is_nan())) {
        return Err(PipelineError::data(format!(
            "Column '{}' still has missing values at feature selection",
            names[idx]
        )));
    }

    let scores = mutual_info_regression(&features, target, n_neighbors, seed);
    Ok(names.into_iter().zip(scores).collect())
}

/// Run all three detectors and collect the drop list
pub fn select_features(
    df: &DataFrame,
    target_name: &str,
    target: &[f64],
    config: &SelectionConfig,
    seed: u64,
) -> Result<SelectionOutcome> {
    let mut entries = Vec::new();

    for column in zero_variance_columns(df)? {
        entries.push(DropEntry {
            column,
            reason: DropReason::ZeroVariance,
        });
    }

    let relevance = relevance_scores(df, target, config.mi_neighbors, seed)?;
    for (column, score) in &relevance {
        if *score < config.mi_threshold {
            entries.push(DropEntry {
                column: column.clone(),
                reason: DropReason::LowRelevance { score: *score },
            });
        }
    }

    for pair in find_collinear_columns(df, config.correlation_threshold)? {
        entries.push(DropEntry {
            column: pair.feature,
            reason: DropReason::Collinear {
                with: pair.correlated_with,
                correlation: pair.correlation,
            },
        });
    }

    let drop_list = DropList::new(entries.iter().map(|e| e.column.clone()));
    tracing::info!(
        target_name,
        features = df.width(),
        dropped = drop_list.len(),
        "feature selection complete"
    );

    if drop_list.len() == df.width() {
        tracing::warn!(target_name, "feature selection dropped every column");
    }

    Ok(SelectionOutcome {
        drop_list,
        entries,
        relevance,
    })
}
