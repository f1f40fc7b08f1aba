//! Audit entry records.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use gate_primitives::TrustLevel;
use serde::{Deserialize, Serialize};

/// Outcome recorded for a call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// The handler returned a value.
    Success,
    /// Validation, the handler, or the deadline failed the call.
    Failure,
    /// Policy refused the call.
    Blocked,
    /// A confirmation token was minted; nothing ran.
    PendingConfirmation,
}

impl AuditStatus {
    /// Returns the snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Blocked => "blocked",
            Self::PendingConfirmation => "pending_confirmation",
        }
    }

    /// Returns `true` for statuses that end a call.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::PendingConfirmation)
    }
}

impl Display for AuditStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one call attempt.
///
/// The timestamp is assigned by [`crate::AuditLog::append`], so entries in a
/// log are ordered by completion and never go backwards in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    timestamp: DateTime<Utc>,
    tool_name: String,
    trust_level: TrustLevel,
    result_status: AuditStatus,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    duration_ms: u64,
}

impl AuditEntry {
    /// Creates an entry for `tool_name` observed at `trust_level`.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, trust_level: TrustLevel, status: AuditStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            tool_name: tool_name.into(),
            trust_level,
            result_status: status,
            error_code: None,
            duration_ms: 0,
        }
    }

    /// Attaches an error code.
    #[must_use]
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Attaches the call duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub(crate) fn stamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    /// Returns when the entry was appended.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the tool name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the trust level captured at dispatch.
    #[must_use]
    pub fn trust_level(&self) -> TrustLevel {
        self.trust_level
    }

    /// Returns the recorded outcome.
    #[must_use]
    pub fn result_status(&self) -> AuditStatus {
        self.result_status
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// Returns the call duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}
