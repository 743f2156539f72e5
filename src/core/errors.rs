//! SWH-prefixed error types with structured error codes.
//!
//! The stream/window data structures themselves never fail — malformed input
//! is coerced or silently excluded. Errors exist only at the edges:
//! configuration load/parse, report serialization, and the simulator
//! harness.

#![allow(missing_docs)]

use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SwhError>;

/// Top-level error type for the stream window helper.
#[derive(Debug, Error)]
pub enum SwhError {
    #[error("[SWH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SWH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SWH-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SWH-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SWH-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SwhError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingConfig { .. } => "SWH-1002",
            Self::ConfigParse { .. } => "SWH-1003",
            Self::Serialization { .. } => "SWH-2101",
            Self::Io { .. } => "SWH-3002",
            Self::Runtime { .. } => "SWH-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Runtime { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::SwhError;

    #[test]
    fn codes_are_stable() {
        let err = SwhError::ConfigParse {
            context: "env",
            details: "bad".to_string(),
        };
        assert_eq!(err.code(), "SWH-1003");
        assert!(format!("{err}").starts_with("[SWH-1003]"));
        let err = SwhError::Runtime {
            details: "producer thread panicked".to_string(),
        };
        assert_eq!(err.code(), "SWH-3900");
        assert!(err.is_retryable());
    }

    #[test]
    fn io_errors_are_retryable() {
        let err = SwhError::Io {
            path: "/tmp/swh.jsonl".into(),
            source: std::io::Error::other("disk gone"),
        };
        assert!(err.is_retryable());
        let err = SwhError::MissingConfig {
            path: "/etc/swh.toml".into(),
        };
        assert!(!err.is_retryable());
    }
}
