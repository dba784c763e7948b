//! Flat observation tables and their CSV encoding.
//!
//! Every connector ends in a [`Table`]: an ordered list of column names and
//! rows of [`Cell`]s of the same width. Tables are written with a header row
//! and no index column.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use crate::types::{StatError, StatResult};

/// A single table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Nested arrays and objects become compact JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Text(b.to_string()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Infer a cell from CSV text. Empty fields read back as null.
    pub fn parse(field: &str) -> Self {
        if field.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = field.parse::<i64>() {
            return Cell::Int(i);
        }
        // "nan"/"inf" parse as floats but are labels here
        if field.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = field.parse::<f64>() {
                return Cell::Float(f);
            }
        }
        Cell::Text(field.to_string())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => {
                let s = v.to_string();
                if v.is_finite() && !s.contains('.') && !s.contains('e') {
                    write!(f, "{s}.0")
                } else {
                    f.write_str(&s)
                }
            }
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<Option<String>> for Cell {
    fn from(v: Option<String>) -> Self {
        v.map(Cell::Text).unwrap_or(Cell::Null)
    }
}

/// A row-per-observation table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Its width must match the column count.
    pub fn push_row(&mut self, row: Vec<Cell>) -> StatResult<()> {
        if row.len() != self.columns.len() {
            return Err(StatError::Shape(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Cell]) -> bool) {
        self.rows.retain(|r| keep(r));
    }

    /// Stack tables that share the same columns.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> StatResult<Table> {
        let mut iter = tables.into_iter();
        let Some(mut out) = iter.next() else {
            return Ok(Table::default());
        };
        for table in iter {
            if table.columns != out.columns {
                return Err(StatError::Shape(format!(
                    "cannot concatenate tables with columns {:?} and {:?}",
                    out.columns, table.columns
                )));
            }
            out.rows.extend(table.rows);
        }
        Ok(out)
    }

    /// Write the table as CSV to any writer.
    pub fn write_csv_to<W: Write>(&self, writer: W) -> StatResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table to `path`, creating parent directories.
    pub fn write_csv(&self, path: &Path) -> StatResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_csv_to(file)
    }

    pub fn to_csv_string(&self) -> StatResult<String> {
        let mut buf = Vec::new();
        self.write_csv_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| StatError::Parse(e.to_string()))
    }

    /// Read a table back from CSV, inferring numeric cells.
    pub fn read_csv_from<R: Read>(reader: R) -> StatResult<Table> {
        let mut rdr = csv::Reader::from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(columns);
        for record in rdr.records() {
            let record = record?;
            table.push_row(record.iter().map(Cell::parse).collect())?;
        }
        Ok(table)
    }

    pub fn read_csv(path: &Path) -> StatResult<Table> {
        let file = std::fs::File::open(path)?;
        Self::read_csv_from(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(["geo", "time", "Value"]);
        t.push_row(vec!["Germany".into(), "2019".into(), Cell::Float(3.5)])
            .unwrap();
        t.push_row(vec!["France, metropolitan".into(), "2019".into(), Cell::Null])
            .unwrap();
        t
    }

    #[test]
    fn test_float_display() {
        assert_eq!(Cell::Float(1234.0).to_string(), "1234.0");
        assert_eq!(Cell::Float(0.25).to_string(), "0.25");
        assert_eq!(Cell::Int(7).to_string(), "7");
        assert_eq!(Cell::Null.to_string(), "");
    }

    #[test]
    fn test_push_row_width_mismatch() {
        let mut t = Table::new(["a", "b"]);
        assert!(t.push_row(vec![Cell::Int(1)]).is_err());
        assert!(t.is_empty());
    }

    #[test]
    fn test_csv_string_quotes_commas() {
        let csv = sample().to_csv_string().unwrap();
        assert_eq!(
            csv,
            "geo,time,Value\nGermany,2019,3.5\n\"France, metropolitan\",2019,\n"
        );
    }

    #[test]
    fn test_file_roundtrip_keeps_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("t.csv");
        let table = sample();
        table.write_csv(&path).unwrap();

        let loaded = Table::read_csv(&path).unwrap();
        assert_eq!(loaded.columns(), table.columns());
        assert_eq!(loaded.len(), table.len());
        // numeric strings come back typed
        assert_eq!(loaded.rows()[0][1], Cell::Int(2019));
        assert_eq!(loaded.rows()[0][2], Cell::Float(3.5));
        assert!(loaded.rows()[1][2].is_null());
    }

    #[test]
    fn test_parse_keeps_word_labels() {
        assert_eq!(Cell::parse("nan"), Cell::Text("nan".to_string()));
        assert_eq!(Cell::parse("-1.5"), Cell::Float(-1.5));
    }

    #[test]
    fn test_concat_rejects_mismatched_columns() {
        let a = Table::new(["x"]);
        let b = Table::new(["y"]);
        assert!(Table::concat([a, b]).is_err());
        assert!(Table::concat(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_from_json_nested() {
        let v = serde_json::json!({"id": "1A", "value": "x"});
        assert_eq!(Cell::from_json(&v), Cell::Text(r#"{"id":"1A","value":"x"}"#.to_string()));
        assert_eq!(Cell::from_json(&serde_json::json!(12)), Cell::Int(12));
        assert_eq!(Cell::from_json(&serde_json::json!(1.5)), Cell::Float(1.5));
    }
}
