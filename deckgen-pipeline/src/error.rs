//! Error types for deckgen-pipeline
//!
//! Errors fall into four groups:
//! - Fatal configuration: schema mismatch on load, unsupported language
//! - Per-item recoverable: one collaborator call failed for one item
//! - Persistence: the store or a deck archive could not be written
//! - Not-found is not an error; lookups return `Option`

use crate::collaborators::CollaboratorError;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Persisted table does not carry exactly the declared columns
    #[error("Schema mismatch in {path}: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Persisted column has a non-text type
    #[error("Column type mismatch: column '{column}' is {found}, expected Utf8")]
    ColumnType { column: String, found: String },

    /// Upsert or lookup referenced a column outside the schema
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// Upsert tried to change the key of a row
    #[error("Key column '{column}' cannot be rewritten ({from} -> {to})")]
    KeyRewrite {
        column: String,
        from: String,
        to: String,
    },

    /// Parquet encoding or decoding failed
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array construction failed
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// External collaborator failed
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Collaborator session could not be opened
    #[error("Failed to open {collaborator} session: {message}")]
    SessionOpen {
        collaborator: &'static str,
        message: String,
    },

    /// Deck archive could not be written
    #[error("Package error: {0}")]
    Package(String),

    /// Source dataset could not be loaded
    #[error("Source error: {0}")]
    Source(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// deckgen-common error
    #[error("Common error: {0}")]
    Common(#[from] deckgen_common::Error),
}

impl PipelineError {
    /// True when the error concerns a single item and the stage may continue
    pub fn is_item_scoped(&self) -> bool {
        match self {
            PipelineError::Collaborator(err) => !err.is_configuration(),
            _ => false,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
