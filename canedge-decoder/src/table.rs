//! CSV table writer
//!
//! Each decode rule owns exactly one table, `<table>.csv` in the output directory.
//! Tables are append-only: rows are written in declared column order and flushed
//! before `append` returns.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::types::{DecodedRow, DecoderError, Result};

/// Name of the leading column present in every table
pub const TIMESTAMP_COLUMN: &str = "timestamp";

struct OpenTable {
    columns: Vec<&'static str>,
    writer: csv::Writer<File>,
    rows_written: usize,
}

/// Single writer for every output table of a run
pub struct TableWriter {
    output_dir: PathBuf,
    tables: HashMap<String, OpenTable>,
}

impl TableWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            tables: HashMap::new(),
        }
    }

    /// Path of the backing file for `table`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.output_dir.join(format!("{}.csv", table))
    }

    /// Create or truncate `table` and write its header row
    pub fn init(&mut self, table: &str, columns: &[&'static str]) -> Result<()> {
        let path = self.table_path(table);
        log::debug!("Initializing table {:?}", path);

        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header(columns))?;
        writer.flush()?;

        self.insert(table, columns, writer);
        Ok(())
    }

    /// Open `table` for appending, creating it if needed
    ///
    /// A missing or empty file gets a header first so no table is ever headerless.
    pub fn open_append(&mut self, table: &str, columns: &[&'static str]) -> Result<()> {
        let path = self.table_path(table);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::Writer::from_writer(file);
        if is_empty {
            log::debug!("Table {:?} is empty, writing header", path);
            writer.write_record(header(columns))?;
            writer.flush()?;
        } else {
            log::debug!("Appending to existing table {:?}", path);
        }

        self.insert(table, columns, writer);
        Ok(())
    }

    /// Append one row; its fields must match the table's declared columns in order
    pub fn append(&mut self, table: &str, row: &DecodedRow) -> Result<()> {
        let open = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DecoderError::TableNotOpen(table.to_string()))?;

        if !row.columns().eq(open.columns.iter().copied()) {
            return Err(DecoderError::SchemaMismatch {
                table: table.to_string(),
                expected: open.columns.iter().map(|c| c.to_string()).collect(),
                actual: row.columns().map(str::to_string).collect(),
            });
        }

        let mut record = Vec::with_capacity(row.fields.len() + 1);
        record.push(format!("{:.6}", row.timestamp));
        record.extend(row.fields.iter().map(|(_, value)| value.to_string()));

        open.writer.write_record(&record)?;
        open.writer.flush()?;
        open.rows_written += 1;
        Ok(())
    }

    /// Rows appended to `table` by this writer
    pub fn rows_written(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows_written)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn insert(&mut self, table: &str, columns: &[&'static str], writer: csv::Writer<File>) {
        self.tables.insert(
            table.to_string(),
            OpenTable {
                columns: columns.to_vec(),
                writer,
                rows_written: 0,
            },
        );
    }
}

fn header(columns: &[&'static str]) -> Vec<&'static str> {
    std::iter::once(TIMESTAMP_COLUMN)
        .chain(columns.iter().copied())
        .collect()
}
