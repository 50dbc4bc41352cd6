//! In-memory sample table and its CSV form.

use std::path::Path;

use serde_json::{Map, Value};

use metaenrich_shared::{EnrichError, Result};

/// Rows drawn from the query engine, every cell already rendered as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SampleTable {
    /// Build a table from JSON row objects, ordering cells by `columns`.
    pub fn from_json_rows(columns: Vec<String>, rows: &[Map<String, Value>]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(col).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep at most `max_rows` rows.
    pub fn truncate(&mut self, max_rows: usize) {
        self.rows.truncate(max_rows);
    }

    /// Write as UTF-8 CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
        if !self.columns.is_empty() {
            writer.write_record(&self.columns).map_err(|e| csv_error(path, e))?;
            for row in &self.rows {
                writer.write_record(row).map_err(|e| csv_error(path, e))?;
            }
        }
        writer.flush().map_err(|e| EnrichError::io(path, e))
    }

    /// Read a CSV written by [`SampleTable::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(path, e))?
            .iter()
            .map(String::from)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(path, e))?;
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self { columns, rows })
    }

    /// Render the first `max_rows` rows as a right-aligned text table.
    pub fn preview(&self, max_rows: usize) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let shown = &self.rows[..self.rows.len().min(max_rows)];
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                shown
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(col.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = vec![render_line(self.columns.iter().map(String::as_str), &widths)];
        for row in shown {
            lines.push(render_line(row.iter().map(String::as_str), &widths));
        }
        lines.join("\n")
    }
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:>width$}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text form of one JSON cell. Null is empty, nested values stay JSON.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_error(path: &Path, e: csv::Error) -> EnrichError {
    EnrichError::Serialization(format!("{}: {e}", path.display()))
}
