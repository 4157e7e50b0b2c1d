//! Error types for record and layout ingestion.

use std::path::PathBuf;

use edi_model::StructureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported layout file {path}: expected .json or .csv")]
    UnsupportedFormat { path: PathBuf },

    // === Parsing Errors ===
    #[error("failed to parse JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse CSV field table: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: invalid {column} value '{value}'")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: missing {column}")]
    MissingValue { row: usize, column: &'static str },

    // === Layout Errors ===
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("failed to write intermediate XML: {0}")]
    Xml(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
