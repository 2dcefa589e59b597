//! Ingestion error types

use spendboard_common::errors::AppError;
use std::path::PathBuf;
use thiserror::Error;

/// A record that cannot be mapped at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("document has no _id")]
    MissingId,
}

/// Failure of a single document; the batch carries on
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Store error for document {document_id}: {source}")]
    Store {
        document_id: String,
        #[source]
        source: AppError,
    },
}

impl IngestionError {
    /// Id of the failing document, when it has one
    pub fn document_id(&self) -> Option<&str> {
        match self {
            IngestionError::Mapping(_) => None,
            IngestionError::Store { document_id, .. } => Some(document_id),
        }
    }
}

/// Failure that aborts a run before any document is processed
#[derive(Error, Debug)]
pub enum IngestionFatalError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected a JSON array or object in {path}, found {found}")]
    Shape { path: PathBuf, found: &'static str },
}
