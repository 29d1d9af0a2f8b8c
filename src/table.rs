//! In-memory tabular data and table sources
//!
//! `DataFrame` is a small column-typed table loaded once per run and shared
//! read-only with the sandboxed executor. Loading goes through the
//! `TableSource` trait so the engine never touches the filesystem directly;
//! `CsvTableSource` is the built-in implementation (CSV and TSV).

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::error::{FlowError, FlowResult};
use crate::session::FileInfo;

/// A single table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, ""),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&Cell> for JsonValue {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => JsonValue::Null,
            Cell::Bool(b) => json!(b),
            Cell::Int(i) => json!(i),
            Cell::Float(x) => json!(x),
            Cell::Str(s) => json!(s),
        }
    }
}

/// Inferred column value type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Bool,
    Int,
    Float,
    Str,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int => "int64",
            DType::Float => "float64",
            DType::Str => "string",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable in-memory table with named, typed columns
#[derive(Debug, Clone)]
pub struct DataFrame {
    columns: Vec<String>,
    dtypes: Vec<DType>,
    rows: Vec<Vec<Cell>>,
}

impl DataFrame {
    /// Build a frame from raw string records, inferring column types.
    ///
    /// Inference per column: all non-empty values parse as i64 -> Int, as
    /// f64 -> Float, as true/false -> Bool, otherwise Str. Empty fields
    /// become Null and do not influence inference.
    pub fn from_records(columns: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let dtypes: Vec<DType> = (0..columns.len())
            .map(|col| infer_dtype(records.iter().filter_map(|r| r.get(col))))
            .collect();

        let rows = records
            .into_iter()
            .map(|record| {
                (0..columns.len())
                    .map(|col| {
                        let raw = record.get(col).map(String::as_str).unwrap_or("");
                        parse_cell(raw, dtypes[col])
                    })
                    .collect()
            })
            .collect();

        Self {
            columns,
            dtypes,
            rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dtypes(&self) -> &[DType] {
        &self.dtypes
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First `n` data rows as JSON records, for the structured preview
    pub fn preview_records(&self, n: usize) -> Vec<JsonValue> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (name, cell) in self.columns.iter().zip(row) {
                    obj.insert(name.clone(), cell.into());
                }
                JsonValue::Object(obj)
            })
            .collect()
    }

    /// Fixed-width text rendering of the header plus the first `n` rows
    pub fn preview_string(&self, n: usize) -> String {
        let shown: Vec<&Vec<Cell>> = self.rows.iter().take(n).collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        let rendered: Vec<Vec<String>> = shown
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        for row in &rendered {
            for (i, value) in row.iter().enumerate() {
                widths[i] = widths[i].max(value.chars().count());
            }
        }

        let mut out = String::new();
        for (i, name) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            out.push_str(&pad(name, widths[i]));
        }
        for row in &rendered {
            out.push('\n');
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    out.push_str("  ");
                }
                out.push_str(&pad(value, widths[i]));
            }
        }
        out
    }
}

fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    let mut out = String::with_capacity(width);
    out.push_str(s);
    for _ in len..width {
        out.push(' ');
    }
    out
}

fn infer_dtype<'a>(values: impl Iterator<Item = &'a String>) -> DType {
    let mut saw_any = false;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;

    for raw in values {
        if raw.is_empty() {
            continue;
        }
        saw_any = true;
        if all_int && raw.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && raw.parse::<f64>().is_err() {
            all_float = false;
        }
        if all_bool && !matches!(raw.to_ascii_lowercase().as_str(), "true" | "false") {
            all_bool = false;
        }
    }

    if !saw_any {
        return DType::Str;
    }
    if all_int {
        DType::Int
    } else if all_float {
        DType::Float
    } else if all_bool {
        DType::Bool
    } else {
        DType::Str
    }
}

fn parse_cell(raw: &str, dtype: DType) -> Cell {
    if raw.is_empty() {
        return Cell::Null;
    }
    match dtype {
        DType::Int => raw
            .parse::<i64>()
            .map(Cell::Int)
            .unwrap_or_else(|_| Cell::Str(raw.to_string())),
        DType::Float => raw
            .parse::<f64>()
            .map(Cell::Float)
            .unwrap_or_else(|_| Cell::Str(raw.to_string())),
        DType::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" => Cell::Bool(true),
            "false" => Cell::Bool(false),
            _ => Cell::Str(raw.to_string()),
        },
        DType::Str => Cell::Str(raw.to_string()),
    }
}

/// Source of tabular data for the workflow
pub trait TableSource: Send + Sync {
    /// Load the full table for a file reference. A parse or read failure is
    /// fatal to the run that requested it.
    fn load(&self, file: &FileInfo) -> FlowResult<DataFrame>;
}

/// Built-in CSV/TSV source
#[derive(Debug, Default)]
pub struct CsvTableSource;

impl CsvTableSource {
    pub fn new() -> Self {
        Self
    }

    fn delimiter_for(path: &Path) -> u8 {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") => b'\t',
            _ => b',',
        }
    }
}

impl TableSource for CsvTableSource {
    fn load(&self, file: &FileInfo) -> FlowResult<DataFrame> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(Self::delimiter_for(&file.filepath))
            .flexible(true)
            .from_path(&file.filepath)
            .map_err(|e| FlowError::DataAccess(format!("{}: {}", file.filename, e)))?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| FlowError::DataAccess(format!("{}: {}", file.filename, e)))?
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut records = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| FlowError::DataAccess(format!("{}: {}", file.filename, e)))?;
            records.push(record.iter().map(|s| s.to_string()).collect());
        }

        Ok(DataFrame::from_records(columns, records))
    }
}

/// Fixed table source, handy for tests and embedding
pub struct StaticTableSource {
    frame: Arc<DataFrame>,
}

impl StaticTableSource {
    pub fn new(frame: DataFrame) -> Self {
        Self {
            frame: Arc::new(frame),
        }
    }
}

impl TableSource for StaticTableSource {
    fn load(&self, _file: &FileInfo) -> FlowResult<DataFrame> {
        Ok(self.frame.as_ref().clone())
    }
}
