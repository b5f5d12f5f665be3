//! Dataset Loader
//!
//! Reads an uploaded file into a `TabularDataset`. Spreadsheets
//! (`.xlsx`, `.xlsm`, `.xls`, `.xlsb`, `.ods`) are read with calamine from
//! the first sheet, whose first row is the header. JSON files hold an
//! array of records.
//!
//! Column types are inferred per column from the non-empty cells: all
//! numbers gives a numeric column, all dates a datetime column, anything
//! else a text column.

use std::path::Path;

use calamine::{Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use ml_analysis_core::{AnalysisError, Column, TabularDataset};

use crate::models::analysis::DatasetReference;

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Source of tabular datasets
pub trait DatasetLoader: Send + Sync {
    fn load(&self, reference: &DatasetReference) -> Result<TabularDataset, AnalysisError>;
}

/// Loader for spreadsheet and JSON files on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDatasetLoader;

impl FileDatasetLoader {
    pub fn new() -> Self {
        Self
    }

    /// Whether a file name has an extension this loader can read
    pub fn supports(file_name: &str) -> bool {
        DatasetReference::new("", file_name)
            .extension()
            .is_some_and(|ext| ext == "json" || SPREADSHEET_EXTENSIONS.contains(&ext.as_str()))
    }
}

impl DatasetLoader for FileDatasetLoader {
    fn load(&self, reference: &DatasetReference) -> Result<TabularDataset, AnalysisError> {
        let extension = reference.extension().ok_or_else(|| {
            AnalysisError::dataset_load(format!("'{}' has no file extension", reference.file_name))
        })?;

        let dataset = match extension.as_str() {
            "json" => load_json(&reference.path)?,
            ext if SPREADSHEET_EXTENSIONS.contains(&ext) => load_spreadsheet(&reference.path)?,
            other => {
                return Err(AnalysisError::dataset_load(format!(
                    "unsupported file type '.{}'",
                    other
                )))
            }
        };

        debug!(
            "Loaded {} ({} rows, {} columns)",
            reference.file_name,
            dataset.row_count(),
            dataset.column_count()
        );
        Ok(dataset)
    }
}

// ============================================================================
// Cell model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Number(f64),
    Date(NaiveDateTime),
    Text(String),
}

fn build_column(name: String, cells: Vec<Cell>) -> Column {
    let filled = || cells.iter().filter(|c| **c != Cell::Empty);

    if filled().all(|c| matches!(c, Cell::Number(_))) && filled().next().is_some() {
        let values = cells
            .iter()
            .map(|c| match c {
                Cell::Number(v) => Some(*v),
                _ => None,
            })
            .collect();
        return Column::numeric(name, values);
    }

    if filled().all(|c| matches!(c, Cell::Date(_))) && filled().next().is_some() {
        let values = cells
            .iter()
            .map(|c| match c {
                Cell::Date(d) => Some(*d),
                _ => None,
            })
            .collect();
        return Column::datetime(name, values);
    }

    let values = cells
        .into_iter()
        .map(|c| match c {
            Cell::Empty => None,
            Cell::Number(v) => Some(v.to_string()),
            Cell::Date(d) => Some(d.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::Text(s) => Some(s),
        })
        .collect();
    Column::text(name, values)
}

fn build_dataset(
    headers: Vec<String>,
    mut cells: Vec<Vec<Cell>>,
) -> Result<TabularDataset, AnalysisError> {
    let columns = headers
        .into_iter()
        .zip(cells.iter_mut())
        .map(|(name, column)| build_column(name, std::mem::take(column)))
        .collect();
    TabularDataset::new(columns).map_err(|e| AnalysisError::dataset_load(e.to_string()))
}

/// Unique, non-empty header names
fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, name)| {
            let base = if name.trim().is_empty() {
                format!("column_{}", i + 1)
            } else {
                name.trim().to_string()
            };
            let mut candidate = base.clone();
            let mut suffix = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect()
}

fn parse_date_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ============================================================================
// Spreadsheets
// ============================================================================

/// `[h]:mm:ss` rendering of a duration cell
fn duration_text(duration: chrono::Duration) -> String {
    let seconds = duration.num_seconds();
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.abs();
    format!("{}{}:{:02}:{:02}", sign, seconds / 3600, seconds / 60 % 60, seconds % 60)
}

fn spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Float(v) => Cell::Number(*v),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) if dt.is_duration() => dt
            .as_duration()
            .map(|d| Cell::Text(duration_text(d)))
            .unwrap_or(Cell::Empty),
        Data::DateTime(dt) => dt.as_datetime().map(Cell::Date).unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) => parse_date_text(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

fn load_spreadsheet(path: &Path) -> Result<TabularDataset, AnalysisError> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| AnalysisError::dataset_load(format!("Failed to open spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AnalysisError::dataset_load("workbook has no sheets"))?
        .map_err(|e| AnalysisError::dataset_load(format!("Failed to read first sheet: {}", e)))?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| AnalysisError::dataset_load("first sheet is empty"))?;
    let headers = normalize_headers(header_row.iter().map(|c| c.to_string()).collect());

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for row in rows {
        if row.iter().all(|c| matches!(spreadsheet_cell(c), Cell::Empty)) {
            continue;
        }
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(row.get(i).map(spreadsheet_cell).unwrap_or(Cell::Empty));
        }
    }

    build_dataset(headers, cells)
}

// ============================================================================
// JSON records
// ============================================================================

fn json_cell(value: Option<&Value>) -> Cell {
    match value {
        None | Some(Value::Null) => Cell::Empty,
        Some(Value::Number(n)) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
        Some(Value::String(s)) if s.trim().is_empty() => Cell::Empty,
        Some(Value::String(s)) => parse_date_text(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Some(Value::Bool(b)) => Cell::Text(b.to_string()),
        Some(other) => Cell::Text(other.to_string()),
    }
}

/// Parse an array of JSON records; keys of the first record fix the column
/// order and later keys are appended
pub fn dataset_from_json(content: &str) -> Result<TabularDataset, AnalysisError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| AnalysisError::dataset_load(format!("Invalid JSON: {}", e)))?;
    let records = value
        .as_array()
        .ok_or_else(|| AnalysisError::dataset_load("JSON dataset must be an array of records"))?;

    let mut headers: Vec<String> = Vec::new();
    for record in records {
        let object = record
            .as_object()
            .ok_or_else(|| AnalysisError::dataset_load("every JSON record must be an object"))?;
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let cells = headers
        .iter()
        .map(|name| {
            records
                .iter()
                .map(|record| json_cell(record.get(name)))
                .collect()
        })
        .collect();

    build_dataset(headers, cells)
}

fn load_json(path: &Path) -> Result<TabularDataset, AnalysisError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AnalysisError::dataset_load(format!("Failed to read {}: {}", path.display(), e))
    })?;
    dataset_from_json(&content)
}
