//! Error types for the tidemark library.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TidemarkError>;

/// Top-level error enum for indexing, graph construction and analysis.
///
/// Per-file parse failures are not represented here: they are values
/// ([`crate::core::ParseError`]) collected by the index builder.
#[derive(Debug, Error)]
pub enum TidemarkError {
    #[error("Invalid repository root {path:?}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("Repository too large: {size_bytes} bytes (limit: {limit_bytes} bytes)")]
    RepositoryTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Repository has too many source files: {count} (limit: {limit})")]
    TooManyFiles { count: usize, limit: usize },

    #[error("Malformed dependency graph: {0}")]
    MalformedGraph(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl TidemarkError {
    /// True when the caller supplied something unusable (a missing root, an
    /// oversized tree, bad configuration) rather than the core failing.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TidemarkError::InvalidRoot { .. }
                | TidemarkError::RepositoryTooLarge { .. }
                | TidemarkError::TooManyFiles { .. }
                | TidemarkError::Config(_)
        )
    }
}
