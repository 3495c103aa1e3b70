//! Error types for invoicer-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or saving records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on load, with the offending file.
    #[error("failed to parse record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (save path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Refused to overwrite an existing record.
    #[error("record already exists at {path}")]
    AlreadyExists { path: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RecordError {
    RecordError::Io {
        path: path.into(),
        source,
    }
}
