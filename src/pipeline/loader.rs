//! Dataset loading and conversion between named tables and numeric matrices

use std::collections::HashSet;
use std::path::Path;

use ndarray::Array2;
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Rows inspected when inferring CSV column types
const INFER_SCHEMA_LENGTH: usize = 10_000;

/// Load a dataset lazily from a file (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path) -> Result<LazyFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(INFER_SCHEMA_LENGTH))
            .finish()?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())?,
        _ => {
            return Err(PipelineError::data(format!(
                "Unsupported file format: '{}'. Supported formats: csv, parquet",
                extension
            )))
        }
    };

    Ok(lf)
}

/// Load and collect a dataset into memory
pub fn load_dataframe(path: &Path) -> Result<DataFrame> {
    let df = load_dataset(path)?.collect()?;
    tracing::debug!(path = %path.display(), rows = df.height(), cols = df.width(), "dataset loaded");
    Ok(df)
}

/// Write a table as CSV or Parquet depending on the extension
pub fn save_dataframe(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).finish(df)?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)?;
            ParquetWriter::new(file).finish(df)?;
        }
        _ => {
            return Err(PipelineError::data(format!(
                "Unsupported output format: '{}'. Supported formats: csv, parquet",
                extension
            )))
        }
    }

    Ok(())
}

/// Extract integer row ids.
///
/// Falls back to the 0-based row position when the id column is absent.
/// Null or duplicate ids are rejected since predictions are merged on them.
pub fn row_ids(df: &DataFrame, id_column: &str) -> Result<Vec<i64>> {
    let column = match df.column(id_column) {
        Ok(column) => column,
        Err(_) => return Ok((0..df.height() as i64).collect()),
    };

    let cast = column.cast(&DataType::Int64)?;
    let mut ids = Vec::with_capacity(df.height());
    let mut seen = HashSet::with_capacity(df.height());
    for (row, value) in cast.i64()?.iter().enumerate() {
        let id = value.ok_or_else(|| {
            PipelineError::data(format!("Id column '{}' is null at row {}", id_column, row))
        })?;
        if !seen.insert(id) {
            return Err(PipelineError::data(format!(
                "Duplicate id {} in column '{}'",
                id, id_column
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

/// Split a table into its feature columns and the named target vectors.
///
/// Every column that is neither the id nor a target is a feature and must be numeric.
/// Target columns must be complete.
pub fn split_features_targets(
    df: &DataFrame,
    id_column: &str,
    targets: &[String],
) -> Result<(DataFrame, Vec<(String, Vec<f64>)>)> {
    let mut feature_columns: Vec<Column> = Vec::new();
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == id_column || targets.iter().any(|t| t == name) {
            continue;
        }
        if !column.dtype().is_primitive_numeric() && !matches!(column.dtype(), DataType::Null) {
            return Err(PipelineError::data(format!(
                "Feature column '{}' has non-numeric type {}",
                name,
                column.dtype()
            )));
        }
        feature_columns.push(column.cast(&DataType::Float64)?);
    }

    let mut target_values = Vec::with_capacity(targets.len());
    for target in targets {
        let column = df.column(target).map_err(|_| {
            PipelineError::data(format!("Target column '{}' not found in dataset", target))
        })?;
        let values = column_values(column)?;
        if let Some(row) = values.iter().position(|v| v.is_nan()) {
            return Err(PipelineError::data(format!(
                "Target column '{}' has a missing value at row {}",
                target, row
            )));
        }
        target_values.push((target.clone(), values));
    }

    Ok((DataFrame::new(feature_columns)?, target_values))
}

/// Feature columns of a serving table: everything except the id and target columns
pub fn feature_frame(df: &DataFrame, id_column: &str, targets: &[String]) -> Result<DataFrame> {
    let excluded: Vec<&str> = std::iter::once(id_column)
        .chain(targets.iter().map(|t| t.as_str()))
        .filter(|name| df.column(name).is_ok())
        .collect();
    let features = df.drop_many(excluded.iter().copied());
    let mut columns = Vec::with_capacity(features.width());
    for column in features.get_columns() {
        columns.push(column.cast(&DataType::Float64)?);
    }
    Ok(DataFrame::new(columns)?)
}

/// Column values as `f64`, nulls mapped to NaN
pub fn column_values(column: &Column) -> Result<Vec<f64>> {
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Names of the table's columns in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// First expected column absent from the table, if any
pub fn first_missing_column<'a>(df: &DataFrame, expected: &'a [String]) -> Option<&'a String> {
    expected.iter().find(|name| df.column(name).is_err())
}

/// Dense matrix of the given columns in the given order, nulls mapped to NaN
pub fn frame_to_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut matrix = Array2::<f64>::zeros((n_rows, columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let values = column_values(df.column(name)?)?;
        for (i, v) in values.into_iter().enumerate() {
            matrix[[i, j]] = v;
        }
    }
    Ok(matrix)
}

/// Build a Float64 table from a matrix; NaN becomes null
pub fn matrix_to_frame(matrix: &Array2<f64>, columns: &[String]) -> Result<DataFrame> {
    if matrix.ncols() != columns.len() {
        return Err(PipelineError::data(format!(
            "Matrix has {} columns but {} names were given",
            matrix.ncols(),
            columns.len()
        )));
    }
    let frame_columns: Vec<Column> = columns
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<Option<f64>> = matrix
                .column(j)
                .iter()
                .map(|&v| if v.is_nan() { None } else { Some(v) })
                .collect();
            Column::new(name.as_str().into(), values)
        })
        .collect();
    Ok(DataFrame::new(frame_columns)?)
}
