//! Error types for the import pipeline
//!
//! None of these escape the running pipeline: workers and the coordinator log them
//! where they happen. Only configuration errors reach the caller of
//! [`Importer::new`](crate::Importer::new).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to open metric file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialise gzip stream for {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read line from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan {dir}: {source}")]
    Scan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ingestion endpoint rejected batch with status {0}")]
    Rejected(reqwest::StatusCode),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Batch channel closed before {0} was fully read")]
    BatchChannelClosed(PathBuf),

    #[error("File reader task failed: {0}")]
    ReaderTask(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Common(#[from] tsdb_common::CommonError),
}

impl ImportError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
