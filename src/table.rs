//! Processed feature/target tables (`processed/{handle}_processed_data.csv`).

use std::collections::HashMap;

use crate::{
    features::{FeatureVector, FEATURE_COLUMNS, TARGET_COLUMN},
    types::TrainingExample,
};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("invalid csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column {0}")]
    MissingColumn(String),
    #[error("row {row}: column {column} has non-numeric value {value:?}")]
    BadValue { row: usize, column: String, value: String },
    #[error("csv writer: {0}")]
    Writer(String),
}

/// A parsed table. Cells stay as text until a column is asked for.
#[derive(Debug, Clone)]
pub struct ProcessedTable {
    columns: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl ProcessedTable {
    pub fn parse(bytes: &[u8]) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
        let columns = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        let rows = reader
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// True when all feature columns and the target are present.
    pub fn is_training_table(&self) -> bool {
        FEATURE_COLUMNS.iter().chain([&TARGET_COLUMN]).all(|c| self.has_column(c))
    }

    fn number(&self, row: usize, column: &str) -> Result<f64, TableError> {
        let idx = *self
            .columns
            .get(column)
            .ok_or_else(|| TableError::MissingColumn(column.to_string()))?;
        let raw = self.rows[row].get(idx).map(|s| s.trim()).unwrap_or("");
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| TableError::BadValue {
                row,
                column: column.to_string(),
                value: raw.to_string(),
            })
    }

    /// Builds the feature vector of `row`. The target column is never read.
    pub fn features(&self, row: usize) -> Result<FeatureVector, TableError> {
        let solved = self.number(row, "solved_count")?;
        if solved < 0.0 {
            return Err(TableError::BadValue {
                row,
                column: "solved_count".to_string(),
                value: solved.to_string(),
            });
        }
        Ok(FeatureVector {
            solved_count: solved.round() as u64,
            avg_rating: self.number(row, "avg_rating")?,
            avg_time_taken: self.number(row, "avg_time_taken")?,
            hard_ratio: self.number(row, "hard_ratio")?,
        })
    }

    pub fn target(&self, row: usize) -> Result<f64, TableError> {
        self.number(row, TARGET_COLUMN)
    }

    pub fn examples(&self) -> Result<Vec<TrainingExample>, TableError> {
        (0..self.len())
            .map(|row| {
                Ok(TrainingExample {
                    features: self.features(row)?,
                    target: self.target(row)?,
                })
            })
            .collect()
    }
}

/// Serializes one feature/target row with the canonical header.
pub fn write_row(features: &FeatureVector, target: f64) -> Result<Vec<u8>, TableError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(FEATURE_COLUMNS.iter().chain([&TARGET_COLUMN]))?;
    let mut record: Vec<String> = vec![features.solved_count.to_string()];
    record.extend(features.to_row()[1..].iter().map(|v| v.to_string()));
    record.push(target.to_string());
    writer.write_record(&record)?;
    writer.into_inner().map_err(|e| TableError::Writer(e.to_string()))
}
