//! # Tabular Data Loading
//!
//! Reads comma-separated training and evaluation tables into the `ndarray`
//! structures the estimator consumes, and writes the interval summary back out.
//!
//! - Training table: a header row, one target column selected by name, an optional
//!   identifier column, and optional excluded columns. Every remaining column is a
//!   feature and must parse as a finite number.
//! - Evaluation table: features are looked up by the training feature names, so
//!   column order may differ and extra columns are ignored.
//! - Failures are treated as user-input errors with the offending column and row.

use ndarray::{Array1, Array2, ShapeError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::estimate::IntervalSummary;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error reading or writing CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),

    #[error("The column '{0}' appears more than once in the header.")]
    DuplicateColumn(String),

    #[error("Column '{column}' has a non-numeric value '{value}' on data row {row}.")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Column '{column}' has a non-finite value on data row {row}.")]
    NonFiniteValue { column: String, row: usize },

    #[error("The training file contains no data rows.")]
    NoRows,

    #[error("The training file has no feature columns after removing the target, id and excluded columns.")]
    NoFeatureColumns,

    #[error("Internal error: failed to assemble the feature matrix: {0}")]
    Shape(#[from] ShapeError),

    #[error("{ids} identifiers were supplied for {rows} summary rows.")]
    RowCountMismatch { ids: usize, rows: usize },
}

/// Column roles shared by the training and evaluation tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    pub target_column: String,
    /// Carried through to the output rather than used as a feature.
    pub id_column: Option<String>,
    pub exclude_columns: Vec<String>,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            target_column: "ratio".to_string(),
            id_column: None,
            exclude_columns: Vec::new(),
        }
    }
}

impl TableSchema {
    fn is_feature(&self, column: &str) -> bool {
        column != self.target_column
            && self.id_column.as_deref() != Some(column)
            && !self.exclude_columns.iter().any(|c| c == column)
    }
}

#[derive(Debug)]
pub struct TrainingTable {
    /// Feature columns in file order. Shape of `features` is `[rows, feature_names.len()]`.
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub targets: Array1<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdColumn {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug)]
pub struct EvaluationTable {
    pub features: Array2<f64>,
    /// Present when the schema names an id column.
    pub ids: Option<IdColumn>,
}

impl EvaluationTable {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn load_training_table(path: &Path, schema: &TableSchema) -> Result<TrainingTable, DataError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader)?;

    let target_idx = column_index(&headers, &schema.target_column)?;
    if let Some(id) = &schema.id_column {
        column_index(&headers, id)?;
    }
    let feature_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| schema.is_feature(name))
        .map(|(idx, name)| (idx, name.clone()))
        .collect();
    if feature_cols.is_empty() {
        return Err(DataError::NoFeatureColumns);
    }

    let mut flat = Vec::new();
    let mut targets = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;
        targets.push(parse_cell(&record, target_idx, &schema.target_column, row)?);
        for (idx, name) in &feature_cols {
            flat.push(parse_cell(&record, *idx, name, row)?);
        }
    }
    if targets.is_empty() {
        return Err(DataError::NoRows);
    }

    let features = Array2::from_shape_vec((targets.len(), feature_cols.len()), flat)?;
    log::info!(
        "Loaded {} training rows with {} features from {}.",
        features.nrows(),
        features.ncols(),
        path.display()
    );
    Ok(TrainingTable {
        feature_names: feature_cols.into_iter().map(|(_, name)| name).collect(),
        features,
        targets: Array1::from_vec(targets),
    })
}

/// Loads evaluation rows, selecting `feature_names` in that order.
pub fn load_evaluation_table(
    path: &Path,
    schema: &TableSchema,
    feature_names: &[String],
) -> Result<EvaluationTable, DataError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader)?;

    let feature_idx = feature_names
        .iter()
        .map(|name| column_index(&headers, name))
        .collect::<Result<Vec<_>, _>>()?;
    let id_idx = match &schema.id_column {
        Some(id) => Some((id.clone(), column_index(&headers, id)?)),
        None => None,
    };

    let mut flat = Vec::new();
    let mut ids = Vec::new();
    let mut rows = 0;
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;
        for (idx, name) in feature_idx.iter().zip(feature_names) {
            flat.push(parse_cell(&record, *idx, name, row)?);
        }
        if let Some((_, idx)) = &id_idx {
            ids.push(record.get(*idx).unwrap_or_default().to_string());
        }
        rows += 1;
    }

    let features = Array2::from_shape_vec((rows, feature_names.len()), flat)?;
    log::info!("Loaded {} evaluation rows from {}.", rows, path.display());
    Ok(EvaluationTable {
        features,
        ids: id_idx.map(|(name, _)| IdColumn { name, values: ids }),
    })
}

/// Writes one output row per evaluation row: the id (when given), mean, lower, upper.
pub fn write_summary(
    path: &Path,
    ids: Option<&IdColumn>,
    summary: &IntervalSummary,
) -> Result<(), DataError> {
    if let Some(ids) = ids {
        if ids.values.len() != summary.len() {
            return Err(DataError::RowCountMismatch {
                ids: ids.values.len(),
                rows: summary.len(),
            });
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut header = Vec::with_capacity(4);
    if let Some(ids) = ids {
        header.push(ids.name.as_str());
    }
    header.extend(["mean", "lower", "upper"]);
    writer.write_record(&header)?;

    for row in 0..summary.len() {
        let mut record = Vec::with_capacity(4);
        if let Some(ids) = ids {
            record.push(ids.values[row].clone());
        }
        record.push(summary.mean[row].to_string());
        record.push(summary.lower[row].to_string());
        record.push(summary.upper[row].to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, DataError> {
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?)
}

fn read_headers(reader: &mut csv::Reader<std::fs::File>) -> Result<Vec<String>, DataError> {
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    for (i, name) in headers.iter().enumerate() {
        if headers[..i].contains(name) {
            return Err(DataError::DuplicateColumn(name.clone()));
        }
    }
    Ok(headers)
}

fn column_index(headers: &[String], name: &str) -> Result<usize, DataError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))
}

fn parse_cell(
    record: &csv::StringRecord,
    idx: usize,
    column: &str,
    row: usize,
) -> Result<f64, DataError> {
    let raw = record.get(idx).unwrap_or_default();
    let value: f64 = raw.parse().map_err(|_| DataError::NonNumeric {
        column: column.to_string(),
        row,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(DataError::NonFiniteValue {
            column: column.to_string(),
            row,
        });
    }
    Ok(value)
}
