//! Missing value analysis, column dropping and k-nearest-neighbor imputation
//!
//! Training fits a [`MissingValueLayout`] which is persisted and replayed on serving
//! tables so both sides see the same columns, indicator columns and imputed values.

use ndarray::{Array2, ArrayView1};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::MissingConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::loader::{column_names, first_missing_column, frame_to_matrix, matrix_to_frame};

/// Analyze missing values in the dataset.
///
/// Returns `(column, missing_ratio)` pairs sorted by ratio descending.
pub fn analyze_missing_values(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let n_rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count() as f64 / n_rows))
        .collect();

    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(missing_ratios)
}

/// Columns with at least one missing value, in table order
pub fn columns_with_missing(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| col.null_count() > 0)
        .map(|col| col.name().to_string())
        .collect()
}

/// A column that was kept and imputed, with its indicator column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImputedColumn {
    pub name: String,
    pub indicator: String,
    pub missing_ratio: f64,
}

/// Fitted missing-value handling for one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingValueLayout {
    pub target: String,
    /// Columns removed because too many values were missing
    pub dropped: Vec<String>,
    pub imputed: Vec<ImputedColumn>,
    /// Output column order, indicator columns included
    pub columns: Vec<String>,
    pub neighbors: usize,
    /// Training rows before imputation (row-major, `None` where missing)
    donors: Vec<Vec<Option<f64>>>,
    /// Observed-value mean per column, used when no donor shares a coordinate
    means: Vec<f64>,
}

/// Result of the training-time missing-value pass
#[derive(Debug, Clone)]
pub struct MissingOutcome {
    pub frame: DataFrame,
    pub dropped: Vec<String>,
    pub layout: MissingValueLayout,
}

/// Drop heavily-missing columns, add indicators and impute the rest.
///
/// Columns with a missing fraction above `config.drop_ratio` are dropped. Every other
/// column with missing values gets a 0/1 indicator column and its missing entries are
/// replaced by the mean of the `config.neighbors` nearest donor rows.
pub fn handle_missing_values(
    df: &DataFrame,
    target: &str,
    config: &MissingConfig,
) -> Result<MissingOutcome> {
    let n_rows = df.height();
    if n_rows == 0 {
        return Err(PipelineError::data("Cannot handle missing values of an empty table"));
    }

    let mut dropped = Vec::new();
    let mut imputed = Vec::new();
    for name in columns_with_missing(df) {
        let ratio = df.column(&name)?.null_count() as f64 / n_rows as f64;
        if ratio > config.drop_ratio {
            tracing::debug!(target_name = target, column = %name, ratio, "dropping column with missing values");
            dropped.push(name);
        } else {
            imputed.push(ImputedColumn {
                indicator: format!("{}{}", name, config.indicator_suffix),
                name,
                missing_ratio: ratio,
            });
        }
    }

    let mut frame = df.drop_many(&dropped);
    for column in &imputed {
        if frame.column(&column.indicator).is_ok() {
            return Err(PipelineError::data(format!(
                "Indicator column '{}' collides with an existing column",
                column.indicator
            )));
        }
        let indicator = indicator_column(frame.column(&column.name)?, &column.indicator);
        frame.with_column(indicator)?;
    }

    let columns = column_names(&frame);
    let raw = frame_to_matrix(&frame, &columns)?;
    let means = observed_means(&raw);

    let layout = MissingValueLayout {
        target: target.to_string(),
        dropped: dropped.clone(),
        imputed,
        columns,
        neighbors: config.neighbors,
        donors: raw
            .outer_iter()
            .map(|row| row.iter().map(|&v| (!v.is_nan()).then_some(v)).collect())
            .collect(),
        means,
    };

    let filled = knn_impute(&raw, &raw, &layout.means, layout.neighbors);
    ensure_complete(&filled, &layout.columns)?;
    let frame = matrix_to_frame(&filled, &layout.columns)?;

    tracing::info!(
        target_name = target,
        dropped = layout.dropped.len(),
        imputed = layout.imputed.len(),
        "missing values handled"
    );

    Ok(MissingOutcome {
        frame,
        dropped,
        layout,
    })
}

impl MissingValueLayout {
    /// Replay the fitted layout on a serving table.
    ///
    /// Indicator columns are always added, from the serving table's own nulls.
    /// The output holds exactly [`MissingValueLayout::columns`] in order.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let present: Vec<&str> = self
            .dropped
            .iter()
            .map(|s| s.as_str())
            .filter(|name| df.column(name).is_ok())
            .collect();
        let mut frame = df.drop_many(present.iter().copied());

        for column in &self.imputed {
            let source = frame.column(&column.name).map_err(|_| PipelineError::ColumnMismatch {
                target: self.target.clone(),
                column: column.name.clone(),
            })?;
            let indicator = indicator_column(source, &column.indicator);
            frame.with_column(indicator)?;
        }

        if let Some(column) = first_missing_column(&frame, &self.columns) {
            return Err(PipelineError::ColumnMismatch {
                target: self.target.clone(),
                column: column.clone(),
            });
        }

        let raw = frame_to_matrix(&frame, &self.columns)?;
        let donors = self.donor_matrix();
        let filled = knn_impute(&raw, &donors, &self.means, self.neighbors);
        ensure_complete(&filled, &self.columns)?;
        matrix_to_frame(&filled, &self.columns)
    }

    fn donor_matrix(&self) -> Array2<f64> {
        let n_cols = self.columns.len();
        let mut matrix = Array2::<f64>::from_elem((self.donors.len(), n_cols), f64::NAN);
        for (i, row) in self.donors.iter().enumerate() {
            for (j, value) in row.iter().enumerate().take(n_cols) {
                if let Some(v) = value {
                    matrix[[i, j]] = *v;
                }
            }
        }
        matrix
    }
}

fn indicator_column(source: &Column, name: &str) -> Column {
    let flags: Vec<f64> = source
        .is_null()
        .iter()
        .map(|missing| if missing.unwrap_or(false) { 1.0 } else { 0.0 })
        .collect();
    Column::new(name.into(), flags)
}

fn observed_means(matrix: &Array2<f64>) -> Vec<f64> {
    matrix
        .columns()
        .into_iter()
        .map(|col| {
            let (sum, count) = col
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
            if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            }
        })
        .collect()
}

fn ensure_complete(matrix: &Array2<f64>, columns: &[String]) -> Result<()> {
    for (j, column) in matrix.columns().into_iter().enumerate() {
        if column.iter().any(|v| v.is_nan()) {
            return Err(PipelineError::data(format!(
                "Column '{}' could not be imputed: no observed values",
                columns.get(j).map(|s| s.as_str()).unwrap_or("?")
            )));
        }
    }
    Ok(())
}

/// Euclidean distance over the coordinates present in both rows, scaled up by
/// `total / present`. `None` when the rows share no coordinate.
pub fn nan_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
    let total = a.len();
    let mut present = 0usize;
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        if x.is_nan() || y.is_nan() {
            continue;
        }
        present += 1;
        sum += (x - y) * (x - y);
    }
    if present == 0 {
        None
    } else {
        Some((total as f64 / present as f64 * sum).sqrt())
    }
}

/// Fill every NaN of `values` with the uniform mean of the `k` nearest donors that
/// observe that column. Ties in distance go to the lower donor index.
fn knn_impute(values: &Array2<f64>, donors: &Array2<f64>, means: &[f64], k: usize) -> Array2<f64> {
    let n_cols = values.ncols();
    let fills: Vec<(usize, Vec<(usize, f64)>)> = (0..values.nrows())
        .into_par_iter()
        .filter_map(|i| {
            let row = values.row(i);
            let missing: Vec<usize> = (0..n_cols).filter(|&j| row[j].is_nan()).collect();
            if missing.is_empty() {
                return None;
            }

            let distances: Vec<Option<f64>> = donors
                .outer_iter()
                .map(|donor| nan_euclidean(row, donor))
                .collect();

            let row_fills = missing
                .iter()
                .map(|&j| {
                    let mut candidates: Vec<(f64, usize)> = distances
                        .iter()
                        .enumerate()
                        .filter_map(|(r, d)| match d {
                            Some(d) if !donors[[r, j]].is_nan() => Some((*d, r)),
                            _ => None,
                        })
                        .collect();

                    if candidates.is_empty() {
                        return (j, means[j]);
                    }

                    candidates.sort_by(|a, b| {
                        a.0.partial_cmp(&b.0)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then(a.1.cmp(&b.1))
                    });
                    let take = candidates.len().min(k);
                    let sum: f64 = candidates[..take].iter().map(|&(_, r)| donors[[r, j]]).sum();
                    (j, sum / take as f64)
                })
                .collect();

            Some((i, row_fills))
        })
        .collect();

    let mut out = values.clone();
    for (i, row_fills) in fills {
        for (j, v) in row_fills {
            out[[i, j]] = v;
        }
    }
    out
}
