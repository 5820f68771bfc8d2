//! Row sources: where step tables come from.

use crate::error::ProcessorError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// An ordered CSV table. Rows keep whatever arity the source had; arity is
/// checked against the header when the rows are processed. Records that could
/// not be decoded keep their position as empty rows and are listed in
/// `unreadable` by 1-based row number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub path: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub unreadable: BTreeMap<usize, String>,
}

impl Table {
    pub fn new(path: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            path: path.into(),
            headers,
            rows,
            unreadable: BTreeMap::new(),
        }
    }

    /// Parse CSV bytes. Header names are trimmed; cells are kept as read.
    pub fn from_csv_bytes(path: impl Into<String>, bytes: &[u8]) -> Result<Self, ProcessorError> {
        let path = path.into();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ProcessorError::SourceRead {
                path: path.clone(),
                row: None,
                message: format!("failed to read CSV headers: {}", e),
            })?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        if headers.iter().all(String::is_empty) {
            return Err(ProcessorError::SourceRead {
                path,
                row: None,
                message: "CSV has no header row".to_string(),
            });
        }

        let mut rows = Vec::new();
        let mut unreadable = BTreeMap::new();
        for (index, record) in reader.records().enumerate() {
            match record {
                Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
                Err(e) => {
                    tracing::warn!("{}: row {} could not be read: {}", path, index + 1, e);
                    unreadable.insert(index + 1, format!("failed to read CSV record: {}", e));
                    rows.push(Vec::new());
                }
            }
        }

        tracing::debug!("Read {} rows from {}", rows.len(), path);
        Ok(Self {
            path,
            headers,
            rows,
            unreadable,
        })
    }

    /// The read failure recorded for row `row_index`, if any.
    pub fn row_error(&self, row_index: usize) -> Option<ProcessorError> {
        self.unreadable
            .get(&row_index)
            .map(|message| ProcessorError::SourceRead {
                path: self.path.clone(),
                row: Some(row_index),
                message: message.clone(),
            })
    }

    /// Data rows paired with their 1-based row number.
    pub fn numbered_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i + 1, row.as_slice()))
    }
}

#[async_trait]
pub trait RowSource: Send + Sync {
    /// Read the table stored at `location`, relative to the source's root.
    async fn read_table(&self, location: &Path) -> Result<Table, ProcessorError>;
}

/// Reads CSV files from a directory.
#[derive(Debug, Clone)]
pub struct CsvRowSource {
    root: PathBuf,
}

impl CsvRowSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RowSource for CsvRowSource {
    async fn read_table(&self, location: &Path) -> Result<Table, ProcessorError> {
        let file_path = self.root.join(location);
        tracing::debug!("Reading CSV from {:?}", file_path);
        let bytes = tokio::fs::read(&file_path)
            .await
            .map_err(|e| ProcessorError::SourceRead {
                path: file_path.to_string_lossy().to_string(),
                row: None,
                message: e.to_string(),
            })?;
        Table::from_csv_bytes(location.to_string_lossy(), &bytes)
    }
}

/// Serves tables registered in memory, keyed by location.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRowSource {
    tables: HashMap<PathBuf, Table>,
}

impl InMemoryRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_csv(
        &mut self,
        location: impl Into<PathBuf>,
        csv_text: &str,
    ) -> Result<(), ProcessorError> {
        let location = location.into();
        let table = Table::from_csv_bytes(location.to_string_lossy(), csv_text.as_bytes())?;
        self.tables.insert(location, table);
        Ok(())
    }

    pub fn with_csv(
        mut self,
        location: impl Into<PathBuf>,
        csv_text: &str,
    ) -> Result<Self, ProcessorError> {
        self.insert_csv(location, csv_text)?;
        Ok(self)
    }

    pub fn insert_table(&mut self, location: impl Into<PathBuf>, table: Table) {
        self.tables.insert(location.into(), table);
    }
}

#[async_trait]
impl RowSource for InMemoryRowSource {
    async fn read_table(&self, location: &Path) -> Result<Table, ProcessorError> {
        self.tables
            .get(location)
            .cloned()
            .ok_or_else(|| ProcessorError::SourceRead {
                path: location.to_string_lossy().to_string(),
                row: None,
                message: "no table registered at this location".to_string(),
            })
    }
}
