use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{ProcessError, StorageError, WorkerError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source file not found: {0}")]
    NotFound(String),

    #[error("Stored document for '{file_id}' is missing at '{path}'")]
    AssetMissing { file_id: String, path: PathBuf },

    #[error("Source file '{file_id}' is not validated: {reason}")]
    NotValidated { file_id: String, reason: String },

    #[error("Document processing failed: {0}")]
    Processing(#[from] ProcessError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Database failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Worker pool failed: {0}")]
    Worker(#[from] WorkerError),

    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the same request may succeed if simply repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Processing(ProcessError::Rasterization(_))
            | PipelineError::Processing(ProcessError::Extraction(_)) => true,
            PipelineError::Worker(WorkerError::QueueFull { .. })
            | PipelineError::Worker(WorkerError::WorkerLost(_)) => true,
            _ => false,
        }
    }
}
