//! Correlation matrix and collinearity detection

use faer::Mat;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::loader::column_values;

/// A column marked as collinear with an earlier column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrelatedPair {
    /// Later column in table order; this is the one dropped
    pub feature: String,
    /// Earlier column it correlates with
    pub correlated_with: String,
    pub correlation: f64,
}

/// Pearson correlation matrix of the table's columns.
///
/// Algorithm:
/// 1. Standardize each column: z = (x - mean) / (std * sqrt(n))
/// 2. Compute R = Z^T * Z
///
/// Constant or incomplete columns have no defined correlation; their rows and
/// columns in the result are NaN.
pub fn correlation_matrix(df: &DataFrame) -> Result<(Mat<f64>, Vec<String>)> {
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let n_rows = df.height();
    let n_cols = names.len();

    let columns: Vec<Vec<f64>> = df
        .get_columns()
        .iter()
        .map(column_values)
        .collect::<Result<_>>()?;

    let standardized: Vec<Option<Vec<f64>>> = columns
        .par_iter()
        .map(|values| {
            if n_rows < 2 || values.iter().any(|v| v.is_nan()) {
                return None;
            }
            let n = n_rows as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
            let std = var.sqrt();
            if std == 0.0 || !std.is_finite() {
                return None; // Constant column - undefined correlation
            }
            let scale = std * n.sqrt();
            Some(values.iter().map(|x| (x - mean) / scale).collect())
        })
        .collect();

    let mut z = Mat::<f64>::zeros(n_rows, n_cols);
    for (col_idx, col) in standardized.iter().enumerate() {
        if let Some(data) = col {
            for (row_idx, &val) in data.iter().enumerate() {
                z[(row_idx, col_idx)] = val;
            }
        }
    }

    let mut corr = z.transpose() * &z;
    for (idx, col) in standardized.iter().enumerate() {
        if col.is_none() {
            for other in 0..n_cols {
                corr[(idx, other)] = f64::NAN;
                corr[(other, idx)] = f64::NAN;
            }
        }
    }

    Ok((corr, names))
}

/// Mark collinear columns.
///
/// For every pair (i, j) with j < i whose absolute correlation exceeds `threshold`,
/// the later column i is marked. The scan is greedy and order-dependent: a column
/// that is already marked still takes part in later comparisons.
pub fn find_collinear_columns(df: &DataFrame, threshold: f64) -> Result<Vec<CorrelatedPair>> {
    if df.width() < 2 {
        return Ok(Vec::new());
    }

    let (corr, names) = correlation_matrix(df)?;
    let mut marked: Vec<CorrelatedPair> = Vec::new();

    for i in 0..names.len() {
        for j in 0..i {
            let c = corr[(i, j)];
            if c.is_nan() || c.abs() <= threshold {
                continue;
            }
            if !marked.iter().any(|p| p.feature == names[i]) {
                marked.push(CorrelatedPair {
                    feature: names[i].clone(),
                    correlated_with: names[j].clone(),
                    correlation: c,
                });
            }
        }
    }

    Ok(marked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_matrix_known_values() {
        let df = df! {
            "a" => [1.0f64, 2.0, 3.0, 4.0, 5.0],
            "b" => [2.0f64, 4.0, 6.0, 8.0, 10.0],
            "c" => [5.0f64, 4.0, 3.0, 2.0, 1.0],
        }
        .unwrap();
        let (corr, names) = correlation_matrix(&df).unwrap();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!((corr[(0, 1)] - 1.0).abs() < 1e-10);
        assert!((corr[(0, 2)] + 1.0).abs() < 1e-10);
        assert!((corr[(1, 1)] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_constant_column_has_undefined_correlation() {
        let df = df! {
            "a" => [1.0f64, 2.0, 3.0],
            "k" => [7.0f64, 7.0, 7.0],
        }
        .unwrap();
        let (corr, _) = correlation_matrix(&df).unwrap();
        assert!(corr[(0, 1)].is_nan());
        assert!(find_collinear_columns(&df, 0.8).unwrap().is_empty());
    }

    #[test]
    fn test_marks_later_column_of_pair() {
        let df = df! {
            "first" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0],
            "noise" => [3.0f64, 1.0, 4.0, 1.0, 5.0, 9.0],
            "second" => [1.1f64, 2.0, 3.2, 3.9, 5.1, 6.0],
        }
        .unwrap();
        let marked = find_collinear_columns(&df, 0.8).unwrap();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].feature, "second");
        assert_eq!(marked[0].correlated_with, "first");
    }
}
