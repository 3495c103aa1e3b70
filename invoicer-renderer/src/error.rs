//! Error types for invoicer-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading a template.
///
/// Substitution itself cannot fail.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Filesystem error while loading a user template.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
