//! Errors raised by the gateway.

use gate_policy::SecurityError;
use gate_tools::error_codes;
use thiserror::Error;

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors the gateway raises instead of returning an execution result.
///
/// Execution failures never appear here; they come back as failed
/// [`gate_tools::ExecutionResult`]s.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The named tool is not registered. Nothing was dispatched or audited.
    #[error("tool `{name}` is not registered")]
    ToolNotFound {
        /// Requested tool name.
        name: String,
    },
    /// Policy refused the call or the confirmation token was unusable.
    #[error(transparent)]
    Security(#[from] SecurityError),
}

impl GatewayError {
    /// Returns a stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ToolNotFound { .. } => error_codes::TOOL_NOT_FOUND,
            Self::Security(err) => err.code(),
        }
    }

    /// Returns the security violation, if this is one.
    #[must_use]
    pub fn as_security(&self) -> Option<&SecurityError> {
        match self {
            Self::Security(err) => Some(err),
            Self::ToolNotFound { .. } => None,
        }
    }
}
