//! Column-wise standardization fitted at training time

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::loader::{column_values, first_missing_column, frame_to_matrix, matrix_to_frame};

/// Mean and population standard deviation of one column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnScale {
    pub name: String,
    pub mean: f64,
    pub std: f64,
}

/// Standard scaler over named columns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    pub target: String,
    pub columns: Vec<ColumnScale>,
}

impl StandardScaler {
    /// Learn per-column mean and standard deviation (ddof = 0).
    ///
    /// A zero standard deviation is stored as 1.0 so transformed values stay finite.
    pub fn fit(df: &DataFrame, target: &str) -> Result<Self> {
        if df.height() == 0 {
            return Err(PipelineError::data("Cannot fit a scaler on an empty table"));
        }

        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let values = column_values(column)?;
            if values.iter().any(|v| v.is_nan()) {
                return Err(PipelineError::data(format!(
                    "Column '{}' has missing values at scaling",
                    column.name()
                )));
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            let mut std = var.sqrt();
            if std == 0.0 {
                tracing::warn!(target_name = target, column = %column.name(), "zero standard deviation, scaling by 1.0");
                std = 1.0;
            }
            columns.push(ColumnScale {
                name: column.name().to_string(),
                mean,
                std,
            });
        }

        Ok(Self {
            target: target.to_string(),
            columns,
        })
    }

    /// Fitted column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Standardized matrix of the fitted columns, read by name from `df`.
    ///
    /// Column order in `df` does not matter and extra columns are ignored.
    pub fn transform_matrix(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let names = self.column_names();
        if let Some(missing) = first_missing_column(df, &names) {
            return Err(PipelineError::ColumnMismatch {
                target: self.target.clone(),
                column: missing.clone(),
            });
        }
        let mut matrix = frame_to_matrix(df, &names)?;
        for (j, scale) in self.columns.iter().enumerate() {
            matrix
                .column_mut(j)
                .mapv_inplace(|v| (v - scale.mean) / scale.std);
        }
        Ok(matrix)
    }

    /// Standardized table with the fitted columns in fitted order
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let matrix = self.transform_matrix(df)?;
        matrix_to_frame(&matrix, &self.column_names())
    }

    /// Undo [`StandardScaler::transform`]
    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let names = self.column_names();
        if let Some(missing) = first_missing_column(df, &names) {
            return Err(PipelineError::ColumnMismatch {
                target: self.target.clone(),
                column: missing.clone(),
            });
        }
        let mut matrix = frame_to_matrix(df, &names)?;
        for (j, scale) in self.columns.iter().enumerate() {
            matrix
                .column_mut(j)
                .mapv_inplace(|v| v * scale.std + scale.mean);
        }
        matrix_to_frame(&matrix, &names)
    }
}
