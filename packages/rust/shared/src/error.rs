//! Error types for tdocgraph.
//!
//! Library crates use [`TdocGraphError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-document fetch, archive, and sanitize failures are recovered into
//! structured outcomes by the retrieval pipeline and never surface through
//! this type to the top level; the variants here exist for the call sites
//! that produce them.

use std::path::PathBuf;

/// Top-level error type for all tdocgraph operations.
#[derive(Debug, thiserror::Error)]
pub enum TdocGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Graph store query failure (store unreachable, malformed query).
    /// Fatal to the current request; no partial ranked list is returned.
    #[error("graph error: {0}")]
    Graph(String),

    /// Network/HTTP error during download, readiness probe, or generation.
    #[error("network error: {0}")]
    Network(String),

    /// Corrupt or unreadable archive.
    #[error("archive error: {0}")]
    Archive(String),

    /// Legacy-document conversion/sanitization error.
    #[error("sanitize error: {0}")]
    Sanitize(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (row shape mismatch, invalid input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The generation backend never reported ready within the wait ceiling.
    /// Fatal to generation only; the ranked list and staged corpus stay valid.
    #[error("generation backend not ready after {waited_secs}s")]
    ServiceNotReady { waited_secs: u64 },

    /// Answer generation request failure (non-success status or transport).
    #[error("generation error: {0}")]
    Generation(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TdocGraphError>;

impl TdocGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = TdocGraphError::config("missing graph password");
        assert_eq!(err.to_string(), "config error: missing graph password");

        let err = TdocGraphError::ServiceNotReady { waited_secs: 300 };
        assert!(err.to_string().contains("300"));

        let err = TdocGraphError::validation("doc_id missing in row");
        assert!(err.to_string().contains("doc_id missing"));
    }
}
