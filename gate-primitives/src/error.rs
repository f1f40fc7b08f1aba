//! Shared error definitions for gateway primitives.

use thiserror::Error;

/// Result alias used throughout the gateway primitives.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The provided confirmation token is not in the minted format.
    #[error("malformed confirmation token: {reason}")]
    MalformedToken {
        /// Human-readable reason for rejection.
        reason: &'static str,
    },

    /// The provided trust level label is not recognised.
    #[error("unknown trust level `{label}`")]
    UnknownTrustLevel {
        /// The offending label.
        label: String,
    },
}
