//! Error types for pestres.
//!
//! Library crates use [`PestresError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pestres operations.
#[derive(Debug, thiserror::Error)]
pub enum PestresError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during a fetch. Never retried by the fetcher.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed or partial JSON payload. The only retryable failure kind.
    #[error("decode error: {0}")]
    Decode(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CSV serialization or write error.
    #[error("export error: {0}")]
    Export(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PestresError>;

impl PestresError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry could plausibly help (decode failures only).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PestresError::config("missing output directory");
        assert_eq!(err.to_string(), "config error: missing output directory");

        let err = PestresError::decode("unexpected end of input at line 1");
        assert!(err.to_string().contains("unexpected end of input"));
    }

    #[test]
    fn only_decode_is_retryable() {
        assert!(PestresError::decode("truncated body").is_retryable());
        assert!(!PestresError::Network("HTTP 502".into()).is_retryable());
        assert!(!PestresError::config("bad toml").is_retryable());
    }
}
