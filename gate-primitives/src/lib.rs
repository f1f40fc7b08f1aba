//! Core shared types for the trustgate tool gateway.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod token;
mod trust;

/// Error type and result alias shared across the gateway crates.
pub use error::{Error, Result};
/// Single-use credential authorizing one pending destructive call.
pub use token::ConfirmToken;
/// Ordered trust levels gating unconfirmed tool calls.
pub use trust::TrustLevel;

/// Keyword arguments supplied to a tool invocation.
pub type Arguments = serde_json::Map<String, serde_json::Value>;
