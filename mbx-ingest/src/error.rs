//! Error types for mbx-ingest
//!
//! `IngestError` covers failures that abort a whole run. Per-item failures
//! never surface here; they become [`ItemIssue`](crate::models::ItemIssue)
//! entries in the run summary.

use crate::storage::ObjectStoreError;
use thiserror::Error;

/// Fatal run error
#[derive(Debug, Error)]
pub enum IngestError {
    /// Backup container could not be converted (tool missing, bad header,
    /// encrypted, non-zero exit). Carries the diagnostic text.
    #[error("Container format error: {0}")]
    ContainerFormat(String),

    /// An archive entry resolved outside the extraction directory
    #[error("Path traversal detected in archive entry: {0}")]
    PathTraversal(String),

    /// Missing or zero-length input container
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Extraction produced no regular files
    #[error("Archive contained no files")]
    EmptyArchive,

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    /// Persistence collaborator refused the batch
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Common error: {0}")]
    Common(#[from] mbx_common::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::ContainerFormat(_) => "CONTAINER_FORMAT",
            IngestError::PathTraversal(_) => "PATH_TRAVERSAL",
            IngestError::EmptyInput(_) => "EMPTY_INPUT",
            IngestError::EmptyArchive => "EMPTY_ARCHIVE",
            IngestError::InvalidRunId(_) => "INVALID_RUN_ID",
            IngestError::Cancelled => "CANCELLED",
            IngestError::Timeout(_) => "TIMEOUT",
            IngestError::Io(_) => "IO_ERROR",
            IngestError::Database(_) => "DATABASE_ERROR",
            IngestError::ObjectStore(_) => "OBJECT_STORE_ERROR",
            IngestError::Persistence(_) => "PERSISTENCE_ERROR",
            IngestError::Common(_) => "COMMON_ERROR",
            IngestError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type for run-level operations
pub type IngestResult<T> = Result<T, IngestError>;
