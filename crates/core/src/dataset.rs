//! Tabular Dataset
//!
//! In-memory, column-oriented representation of an uploaded table. Columns
//! are typed once at load time (numeric, text or date/time) and every
//! column holds the same number of rows; missing cells are `None`.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Values of a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    DateTime(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    /// Number of rows in the column
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
        }
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    /// Create a numeric column
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    /// Create a text column
    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    /// Create a date/time column
    pub fn datetime(name: impl Into<String>, values: Vec<Option<NaiveDateTime>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::DateTime(values),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    pub fn is_datetime(&self) -> bool {
        matches!(self.data, ColumnData::DateTime(_))
    }

    /// Numeric values, `None` for non-numeric columns
    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    /// Cell rendered as a grouping key. Missing cells yield `None`.
    pub fn key_at(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Numeric(v) => v.get(row).copied().flatten().map(format_number_key),
            ColumnData::Text(v) => v.get(row).cloned().flatten(),
            ColumnData::DateTime(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Number of distinct non-missing values
    pub fn distinct_count(&self) -> usize {
        (0..self.data.len())
            .filter_map(|row| self.key_at(row))
            .collect::<HashSet<_>>()
            .len()
    }
}

fn format_number_key(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Column-oriented table with uniform row count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularDataset {
    columns: Vec<Column>,
    rows: usize,
}

impl TabularDataset {
    /// Build a dataset, validating that all columns share one row count
    /// and that column names are unique.
    pub fn new(columns: Vec<Column>) -> CoreResult<Self> {
        let rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if column.data.len() != rows {
                return Err(CoreError::invalid_data(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.data.len(),
                    rows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(CoreError::invalid_data(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with `InvalidData` when absent
    pub fn require_column(&self, name: &str) -> CoreResult<&Column> {
        self.column(name)
            .ok_or_else(|| CoreError::invalid_data(format!("column '{}' not found", name)))
    }

    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_numeric()).collect()
    }

    pub fn has_datetime_column(&self) -> bool {
        self.columns.iter().any(|c| c.is_datetime())
    }

    /// Values of a numeric column with missing cells dropped
    pub fn numeric_values(&self, name: &str) -> CoreResult<Vec<f64>> {
        let column = self.require_column(name)?;
        let values = column.as_numeric().ok_or_else(|| {
            CoreError::invalid_data(format!("column '{}' is not numeric", name))
        })?;
        Ok(values.iter().filter_map(|v| *v).filter(|v| v.is_finite()).collect())
    }

    /// Row-major matrix over the given numeric columns. Rows with any
    /// missing or non-finite cell are dropped; the kept row indices are
    /// returned alongside the matrix.
    pub fn numeric_matrix(&self, names: &[&str]) -> CoreResult<(Vec<Vec<f64>>, Vec<usize>)> {
        let mut series = Vec::with_capacity(names.len());
        for name in names {
            let column = self.require_column(name)?;
            let values = column.as_numeric().ok_or_else(|| {
                CoreError::invalid_data(format!("column '{}' is not numeric", name))
            })?;
            series.push(values);
        }

        let mut matrix = Vec::new();
        let mut kept = Vec::new();
        for row in 0..self.rows {
            let values: Option<Vec<f64>> = series
                .iter()
                .map(|s| s[row].filter(|v| v.is_finite()))
                .collect();
            if let Some(values) = values {
                matrix.push(values);
                kept.push(row);
            }
        }
        Ok((matrix, kept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> TabularDataset {
        let date = |d: u32| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        };
        TabularDataset::new(vec![
            Column::datetime("fecha", vec![date(1), date(2), date(3), date(4)]),
            Column::text(
                "tienda",
                vec![
                    Some("A".into()),
                    Some("B".into()),
                    Some("A".into()),
                    None,
                ],
            ),
            Column::numeric("ventas", vec![Some(10.0), Some(12.5), None, Some(9.0)]),
            Column::numeric("unidades", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_shape() {
        let ds = sample();
        assert_eq!(ds.row_count(), 4);
        assert_eq!(ds.column_count(), 4);
        assert!(ds.has_datetime_column());
        assert_eq!(ds.numeric_columns().len(), 2);
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let result = TabularDataset::new(vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("b", vec![Some(1.0), Some(2.0)]),
        ]);
        assert!(matches!(result, Err(CoreError::InvalidData(_))));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = TabularDataset::new(vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("a", vec![Some(2.0)]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_distinct_count_ignores_missing() {
        let ds = sample();
        assert_eq!(ds.column("tienda").unwrap().distinct_count(), 2);
        assert_eq!(ds.column("unidades").unwrap().distinct_count(), 4);
    }

    #[test]
    fn test_numeric_matrix_drops_incomplete_rows() {
        let ds = sample();
        let (matrix, kept) = ds.numeric_matrix(&["ventas", "unidades"]).unwrap();
        assert_eq!(matrix.len(), 3);
        assert_eq!(kept, vec![0, 1, 3]);
        assert_eq!(matrix[2], vec![9.0, 4.0]);
    }

    #[test]
    fn test_numeric_values_rejects_text_column() {
        let ds = sample();
        assert!(ds.numeric_values("tienda").is_err());
        assert_eq!(ds.numeric_values("ventas").unwrap(), vec![10.0, 12.5, 9.0]);
    }

    #[test]
    fn test_number_keys_are_stable() {
        let col = Column::numeric("g", vec![Some(1.0), Some(1.0), Some(2.5)]);
        assert_eq!(col.key_at(0).as_deref(), Some("1"));
        assert_eq!(col.key_at(2).as_deref(), Some("2.5"));
    }
}
