//! Error types for the audit subsystem.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted while exporting or reading audit logs.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Underlying I/O failure while writing or reading export files.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
}

/// Result type alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
