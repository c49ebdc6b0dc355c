//! CSV task table: header-preserving load and byte-order-mark aware serialisation.

use std::collections::HashMap;
use std::path::Path;

use crate::error::TableError;
use crate::types::{COL_LAST_RUN_TIME, COL_PROCESS_NAME};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One row, keyed by column name. Cells for unknown columns are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRow {
    cells: HashMap<String, String>,
}

impl TaskRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Cell value, or `""` when the row has no such cell.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.cells.insert(column.to_string(), value.into());
    }

    /// `ProcessName`, `"Unknown"` when blank.
    pub fn name(&self) -> &str {
        match self.get(COL_PROCESS_NAME) {
            "" => "Unknown",
            name => name,
        }
    }
}

/// Ordered rows plus the declared column set.
///
/// Rebuilt from disk every cycle and dropped at its end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskTable {
    columns: Vec<String>,
    rows: Vec<TaskRow>,
}

impl TaskTable {
    pub fn new(columns: Vec<String>, rows: Vec<TaskRow>) -> Self {
        Self { columns, rows }
    }

    /// Read and parse the table at `path`.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let raw = std::fs::read(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse CSV bytes, tolerating a leading UTF-8 byte-order mark and ragged rows.
    pub fn parse(raw: &[u8]) -> Result<Self, TableError> {
        let body = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            // Cells past the last header have no column to live in and are dropped.
            let row = TaskRow::from_pairs(
                columns
                    .iter()
                    .zip(record.iter())
                    .map(|(col, cell)| (col.as_str(), cell)),
            );
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TaskRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [TaskRow] {
        &mut self.rows
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Append `LastRunTime` to the column set if the file did not declare it.
    pub fn ensure_last_run_column(&mut self) {
        if !self.has_column(COL_LAST_RUN_TIME) {
            self.columns.push(COL_LAST_RUN_TIME.to_string());
        }
    }

    /// Serialise every row in order, header first, prefixed with a UTF-8 BOM.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, TableError> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(UTF8_BOM.to_vec());

        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(self.columns.iter().map(|c| row.get(c)))?;
        }

        writer
            .into_inner()
            .map_err(|e| TableError::Flush(e.to_string()))
    }
}
