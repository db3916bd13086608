mod csv_codec;
mod flat_file;
mod sqlite;

pub use csv_codec::{decode_records, encode_records};
pub use flat_file::FlatFileStore;
pub use sqlite::SqliteStore;

use crate::record::StudentRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Csv,
    Sqlite,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Csv => "csv",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Name of the store file inside a workspace.
    pub fn file_name(self) -> &'static str {
        match self {
            Backend::Csv => flat_file::FILE_NAME,
            Backend::Sqlite => sqlite::FILE_NAME,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "flat" | "file" => Ok(Backend::Csv),
            "sqlite" | "sql" | "db" => Ok(Backend::Sqlite),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {admission_no}")]
    NotFound { admission_no: String },
    #[error("admission number already exists: {admission_no}")]
    Duplicate { admission_no: String },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record store is corrupt at line {line}: {message}")]
    Corrupt { line: usize, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Error code reported over IPC.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::Duplicate { .. } => "duplicate_key",
            StoreError::Unavailable(_) => "store_unavailable",
            StoreError::Corrupt { .. } => "store_corrupt",
            StoreError::Io(_) => "io_failed",
            StoreError::Sqlite(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            StoreError::NotFound { admission_no } | StoreError::Duplicate { admission_no } => {
                Some(serde_json::json!({ "admissionNo": admission_no }))
            }
            StoreError::Corrupt { line, .. } => Some(serde_json::json!({ "line": line })),
            _ => None,
        }
    }
}

/// CRUD contract shared by the flat-file and relational backends.
///
/// Every call runs to completion against persistent storage; nothing is cached
/// between calls. Admission numbers are unique in both backends.
pub trait RecordStore {
    fn backend(&self) -> Backend;

    fn location(&self) -> &Path;

    /// All records in storage order.
    fn list(&self) -> Result<Vec<StudentRecord>, StoreError>;

    /// First record with this admission number.
    fn get(&self, admission_no: &str) -> Result<Option<StudentRecord>, StoreError>;

    fn create(&mut self, record: &StudentRecord) -> Result<(), StoreError>;

    /// Replaces every field except the key of the record with the same admission number.
    fn update(&mut self, record: &StudentRecord) -> Result<(), StoreError>;

    /// Returns whether a record was actually removed.
    fn delete(&mut self, admission_no: &str) -> Result<bool, StoreError>;
}

pub fn open_store(workspace: &Path, backend: Backend) -> Result<Box<dyn RecordStore>, StoreError> {
    std::fs::create_dir_all(workspace)?;
    let store: Box<dyn RecordStore> = match backend {
        Backend::Csv => Box::new(FlatFileStore::open(workspace.join(flat_file::FILE_NAME))?),
        Backend::Sqlite => Box::new(SqliteStore::open(workspace.join(sqlite::FILE_NAME))?),
    };
    tracing::info!(
        backend = %backend,
        path = %store.location().display(),
        "record store opened"
    );
    Ok(store)
}
