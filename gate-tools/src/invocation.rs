//! Call and result types flowing through the registry.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use gate_primitives::Arguments;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable error codes attached to failure results produced by the framework
/// itself rather than by a handler.
pub mod error_codes {
    /// The requested tool is not registered.
    pub const TOOL_NOT_FOUND: &str = "ToolNotFoundError";
    /// The arguments did not satisfy the tool schema.
    pub const VALIDATION: &str = "ValidationError";
    /// The handler exceeded its deadline.
    pub const TIMEOUT: &str = "TimeoutError";
    /// The handler panicked.
    pub const PANIC: &str = "HandlerPanic";
    /// The executor was closed before the call was admitted.
    pub const EXECUTOR_CLOSED: &str = "ExecutorClosed";
    /// The handler task was cancelled before it produced a value.
    pub const CANCELLED: &str = "CancelledError";
}

/// Value returned by tool handlers.
pub type ToolOutput = Result<Value, ToolFailure>;

/// Failure raised by a tool handler.
///
/// Any [`std::error::Error`] converts into a `ToolFailure` through `?`, taking
/// the error's short type name as its code. The type deliberately does not
/// implement [`std::error::Error`] itself so that conversion stays coherent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    code: String,
    message: String,
}

impl ToolFailure {
    /// Creates a failure with an explicit code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns the failure code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ToolFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl<E> From<E> for ToolFailure
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A single invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    tool_name: String,
    #[serde(default)]
    arguments: Arguments,
}

impl ToolCall {
    /// Creates a call for the named tool.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Returns the targeted tool name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the supplied arguments.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Splits the call into its name and arguments.
    #[must_use]
    pub fn into_parts(self) -> (String, Arguments) {
        (self.tool_name, self.arguments)
    }
}

/// Terminal status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The handler returned a value.
    Success,
    /// Validation, the handler, or the deadline failed the call.
    Failure,
}

/// Error detail carried by a failed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    #[serde(rename = "type")]
    code: String,
    message: String,
}

impl ExecutionError {
    /// Returns the error code (the handler error's type name or a framework code).
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ToolFailure> for ExecutionError {
    fn from(failure: ToolFailure) -> Self {
        Self {
            code: failure.code,
            message: failure.message,
        }
    }
}

/// Outcome of one registry execution; produced exactly once per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    tool_name: String,
    status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ExecutionError>,
    duration_ms: u64,
}

impl ExecutionResult {
    /// Builds a success result.
    #[must_use]
    pub fn success(tool_name: impl Into<String>, data: Value, duration: Duration) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: ExecutionStatus::Success,
            data: Some(data),
            error: None,
            duration_ms: millis(duration),
        }
    }

    /// Builds a failure result.
    #[must_use]
    pub fn failure(tool_name: impl Into<String>, failure: ToolFailure, duration: Duration) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: ExecutionStatus::Failure,
            data: None,
            error: Some(failure.into()),
            duration_ms: millis(duration),
        }
    }

    /// Returns the tool name the result belongs to.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the terminal status.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Returns `true` for successful executions.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Returns the handler output, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Consumes the result, returning the handler output.
    #[must_use]
    pub fn into_data(self) -> Option<Value> {
        self.data
    }

    /// Returns the error detail for failures.
    #[must_use]
    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    /// Returns the error code for failures.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(ExecutionError::code)
    }

    /// Returns the wall-clock duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
