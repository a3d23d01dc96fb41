//! Error types for blockgrid.

use crate::block::BlockId;
use thiserror::Error;

/// Errors surfaced by the positional store.
///
/// A block storage unit that does not exist is not an error: reads against
/// it yield empty results.
#[derive(Error, Debug)]
pub enum GridError {
    /// No record with this id at the resolved location(s).
    #[error("No point found with id {id}")]
    NotFound { id: String },

    /// The operation is not allowed, e.g. editing the immutable `id`.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Non-finite coordinates, negative radius and similar argument errors.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A record or patch does not fit the store's declared schema.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// An insert hit an id that is already stored; `block` is where it lives.
    #[error("Duplicate id {id}, already stored in block {block}")]
    DuplicateId { id: String, block: BlockId },

    /// An insert or replace targeted a storage unit that does not exist.
    #[error("Storage unit {0} does not exist")]
    MissingUnit(BlockId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The persisted store was created with a different block size or schema.
    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid file format")]
    InvalidFormat,

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Database is closed")]
    DatabaseClosed,
}

#[cfg(feature = "aof")]
impl From<bincode::Error> for GridError {
    fn from(err: bincode::Error) -> Self {
        GridError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Serialization(err.to_string())
    }
}

impl GridError {
    pub(crate) fn not_found<S: Into<String>>(id: S) -> Self {
        GridError::NotFound { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GridError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, GridError>;
