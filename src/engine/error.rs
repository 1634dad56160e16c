//! Error types for the table store.
//!
//! Every engine and persistence operation returns its failure to the
//! immediate caller. Nothing here is fatal: the engine stays usable after
//! any of these errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the CRUD engine and the table model.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A table with this name is already registered.
    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    /// No table with this name is registered.
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// The table exists but holds no record with this identifier.
    #[error("record {id} not found in table '{table}'")]
    RecordNotFound { table: String, id: i64 },

    /// The value list does not line up with the table's declared fields.
    #[error("field count mismatch for table '{table}': expected {expected} values, got {found}")]
    FieldCountMismatch {
        table: String,
        expected: usize,
        found: usize,
    },

    /// A user schema tried to declare the system-managed identifier column.
    #[error("field name 'id' is reserved for the record identifier")]
    ReservedFieldName,

    /// The declared field list cannot describe a table.
    #[error("invalid schema for table '{table}': {reason}")]
    InvalidSchema { table: String, reason: String },

    /// Every identifier up to `i64::MAX` has been handed out.
    #[error("table '{0}' has no identifiers left")]
    IdSpaceExhausted(String),

    /// The table name cannot be used as a storage file name.
    #[error("invalid table name '{0}'")]
    InvalidTableName(String),

    /// Reading or writing the backing file failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors raised by the CSV storage layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The file exists but has no header row.
    #[error("table file {path} is empty")]
    EmptyFile { path: PathBuf },

    /// The header row does not describe a valid schema.
    #[error("invalid header in {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: String },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PersistenceError::Csv {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying failure is a missing file.
    pub fn is_not_found(&self) -> bool {
        match self {
            PersistenceError::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            PersistenceError::Csv { .. }
            | PersistenceError::EmptyFile { .. }
            | PersistenceError::InvalidHeader { .. } => false,
        }
    }
}
