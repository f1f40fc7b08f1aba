//! Fail-closed policy violations.

use gate_primitives::TrustLevel;
use thiserror::Error;

/// Raised when policy blocks a call or a confirmation token is unusable.
///
/// Unlike execution failures, these are returned as errors so callers must
/// handle them explicitly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecurityError {
    /// The policy engine blocked the call.
    #[error("call to `{tool}` blocked at trust level {trust_level}: {reason}")]
    Blocked {
        /// Targeted tool.
        tool: String,
        /// Trust level captured at dispatch.
        trust_level: TrustLevel,
        /// Reason reported by the engine.
        reason: String,
    },
    /// The token is unknown, already redeemed, malformed, or expired.
    #[error("confirmation token is invalid or expired")]
    InvalidToken,
    /// The token was minted for a different tool.
    #[error("confirmation token does not match tool `{tool}`")]
    ToolMismatch {
        /// Tool the caller tried to redeem the token against.
        tool: String,
    },
    /// The token was minted for different arguments.
    #[error("confirmation token does not match the arguments for `{tool}`")]
    ArgumentsMismatch {
        /// Tool the caller tried to redeem the token against.
        tool: String,
    },
    /// The policy engine failed; the call is refused.
    #[error("policy engine unavailable: {reason}")]
    PolicyUnavailable {
        /// Underlying engine error.
        reason: String,
    },
}

impl SecurityError {
    /// Returns the stable code recorded in audit entries.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Blocked { .. } => "PolicyBlocked",
            Self::InvalidToken => "InvalidConfirmToken",
            Self::ToolMismatch { .. } => "ConfirmTokenToolMismatch",
            Self::ArgumentsMismatch { .. } => "ConfirmTokenArgumentsMismatch",
            Self::PolicyUnavailable { .. } => "PolicyUnavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_violation() {
        assert!(SecurityError::InvalidToken.to_string().contains("invalid or expired"));
        let mismatch = SecurityError::ToolMismatch {
            tool: "rm".into(),
        };
        assert!(mismatch.to_string().contains("token does not match tool"));
        assert_eq!(mismatch.code(), "ConfirmTokenToolMismatch");
    }
}
