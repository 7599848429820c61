//! Minimal tabular container for the pipeline's CSV files.
//!
//! Cells are kept as the text that was read or exported so that a frame
//! written back to CSV is byte-for-byte what went in. Typed views
//! ([`DataFrame::numeric_column`], [`DataFrame::feature_matrix`]) parse on
//! demand; empty cells and the literal `na` count as missing.

use crate::error::PipelineError;
use ndarray::Array2;
use sensorguard_core::persistence::atomic_write;
use sensorguard_core::store::Document;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Token the sensor exports use for a missing reading.
pub const MISSING_TOKEN: &str = "na";

/// Whether a cell holds no value.
pub fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || trimmed == MISSING_TOKEN
}

/// Parse a present cell as a number.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataFrame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, PipelineError> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(PipelineError::schema(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a frame from store documents.
    ///
    /// Columns follow first appearance across documents; a key missing from
    /// a document becomes an empty cell.
    pub fn from_documents(docs: &[Document]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for doc in docs {
            for key in doc.keys() {
                if !index.contains_key(key) {
                    index.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let rows = docs
            .iter()
            .map(|doc| {
                let mut row = vec![String::new(); columns.len()];
                for (key, value) in doc {
                    if let Some(&i) = index.get(key) {
                        row[i] = value_to_cell(value);
                    }
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn read_csv(path: &Path) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.into_inner()
            .map_err(|e| PipelineError::Io(e.into_error()))
    }

    /// Write the frame with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        let bytes = self.to_csv_bytes()?;
        atomic_write(path, &bytes)?;
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let i = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[i].as_str()).collect())
    }

    /// Remove the named columns, ignoring names that are absent. Returns
    /// the names actually removed.
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let keep: Vec<bool> = self.columns.iter().map(|c| !names.contains(c)).collect();
        let dropped = self
            .columns
            .iter()
            .zip(&keep)
            .filter(|(_, k)| !**k)
            .map(|(c, _)| c.clone())
            .collect::<Vec<_>>();
        if dropped.is_empty() {
            return dropped;
        }
        self.columns = retain_by_mask(std::mem::take(&mut self.columns), &keep);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), &keep);
        }
        dropped
    }

    /// Remove a column and return its cells.
    pub fn remove_column(&mut self, name: &str) -> Option<Vec<String>> {
        let i = self.column_index(name)?;
        self.columns.remove(i);
        Some(self.rows.iter_mut().map(|r| r.remove(i)).collect())
    }

    pub fn push_column(&mut self, name: &str, values: Vec<String>) -> Result<(), PipelineError> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::schema(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        if self.has_column(name) {
            return Err(PipelineError::schema(format!("column '{name}' already exists")));
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// New frame with the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Append the rows of `other`; both frames must have the same columns.
    pub fn vstack(&self, other: &DataFrame) -> Result<Self, PipelineError> {
        if self.columns != other.columns {
            return Err(PipelineError::schema(
                "cannot concatenate frames with different columns",
            ));
        }
        let mut rows = self.rows.clone();
        rows.extend(other.rows.iter().cloned());
        Ok(Self {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Values of a numeric column with missing cells as `NaN`.
    ///
    /// `None` when the column is absent or holds a present, non-numeric cell.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<f64>> {
        let i = self.column_index(name)?;
        self.rows
            .iter()
            .map(|r| {
                let cell = r[i].as_str();
                if is_missing(cell) {
                    Some(f64::NAN)
                } else {
                    parse_number(cell)
                }
            })
            .collect()
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.numeric_column(name).is_some()
    }

    /// Numeric matrix of the named columns, in the given order.
    pub fn feature_matrix(&self, names: &[String]) -> Result<Array2<f64>, PipelineError> {
        let mut x = Array2::<f64>::zeros((self.rows.len(), names.len()));
        for (j, name) in names.iter().enumerate() {
            if !self.has_column(name) {
                return Err(PipelineError::schema(format!("missing column '{name}'")));
            }
            let values = self.numeric_column(name).ok_or_else(|| {
                PipelineError::schema(format!("column '{name}' is not numeric"))
            })?;
            for (i, v) in values.into_iter().enumerate() {
                x[[i, j]] = v;
            }
        }
        Ok(x)
    }

    /// Rows as JSON objects. Numeric cells become numbers, missing cells `null`.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, cell)| (c.clone(), cell_to_value(cell)))
                    .collect()
            })
            .collect()
    }
}

fn retain_by_mask(values: Vec<String>, keep: &[bool]) -> Vec<String> {
    values
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(v, _)| v)
        .collect()
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &str) -> Value {
    if is_missing(cell) {
        return Value::Null;
    }
    let trimmed = cell.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    match parse_number(trimmed).and_then(serde_json::Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(cell.to_string()),
    }
}
