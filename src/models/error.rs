//! Error types for wordfold.
//!
//! Taxonomy:
//! - Source failures: transient, retried by the engine indefinitely
//! - Checkpoint failures: corrupt state is treated as absent, write failures surface
//! - Invariant violations: bugs, never retried

use thiserror::Error;

/// Top-level error type for wordfold.
#[derive(Debug, Error)]
pub enum WordfoldError {
    // ═══════════════════════════════════════════════════════════════════
    // CONFIGURATION — rejected before any work starts
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ═══════════════════════════════════════════════════════════════════
    // SOURCE — recovered locally by backoff and retry
    // ═══════════════════════════════════════════════════════════════════

    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    // ═══════════════════════════════════════════════════════════════════
    // CHECKPOINT — persisted state
    // ═══════════════════════════════════════════════════════════════════

    #[error("Corrupt checkpoint {path}: {reason}")]
    CorruptCheckpoint { path: String, reason: String },

    #[error("Failed to persist {what}: {source}")]
    PersistenceFailure {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No final result found at {0}; run with recompute first")]
    ResultNotFound(String),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // CONTROL — cooperative shutdown and invariants
    // ═══════════════════════════════════════════════════════════════════

    #[error("Run cancelled at watermark {last_id}")]
    Cancelled { last_id: i64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Record source specific errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection failed for {uri}: {message}")]
    Connection { uri: String, message: String },

    #[error("Source broke its ordering contract: {0}")]
    Contract(String),

    #[error("Reader task failed: {0}")]
    Task(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

impl WordfoldError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a persistence error for the named artifact.
    pub fn persistence(what: impl Into<String>, source: std::io::Error) -> Self {
        Self::PersistenceFailure {
            what: what.into(),
            source,
        }
    }

    /// Create a corrupt-checkpoint error.
    pub fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::CorruptCheckpoint {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Every source failure is treated as transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }
}

/// Result type alias for wordfold.
pub type Result<T> = std::result::Result<T, WordfoldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_source_errors_are_retryable() {
        let source = WordfoldError::from(SourceError::Connection {
            uri: "reviews.db".to_string(),
            message: "refused".to_string(),
        });
        assert!(source.is_retryable());

        let persist = WordfoldError::persistence(
            "checkpoint",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        );
        assert!(!persist.is_retryable());
        assert!(!WordfoldError::Cancelled { last_id: 3 }.is_retryable());
    }

    #[test]
    fn test_corrupt_message_names_path() {
        let err = WordfoldError::corrupt(std::path::Path::new("/tmp/checkpoint.json"), "bad crc");
        assert_eq!(
            err.to_string(),
            "Corrupt checkpoint /tmp/checkpoint.json: bad crc"
        );
    }
}
