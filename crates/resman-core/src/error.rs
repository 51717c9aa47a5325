use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the log store and the archive.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// An append was handed something that is not a JSON object.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive file already exists: {}", .0.display())]
    ArchiveExists(PathBuf),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
