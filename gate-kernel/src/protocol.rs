//! Request/response façade exposing `tools/list` and `tools/call`.
//!
//! Transport framing is left to the caller; this module only maps a method
//! name and JSON params onto the gateway and shapes the reply as
//! `{"content": ...}` or `{"error": {"code", "message"}}`.

use std::sync::Arc;

use gate_primitives::Arguments;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::gateway::{CallOutcome, TrustGateway};

/// Method listing registered tools.
pub const TOOLS_LIST: &str = "tools/list";

/// Method invoking a tool through the gateway.
pub const TOOLS_CALL: &str = "tools/call";

/// Error code for unsupported methods.
pub const METHOD_NOT_FOUND: &str = "MethodNotFound";

/// Error code for params that do not decode.
pub const INVALID_PARAMS: &str = "InvalidParams";

/// Params of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolRequest {
    /// Tool to invoke.
    pub name: String,
    /// Keyword arguments.
    #[serde(default)]
    pub arguments: Arguments,
    /// Token returned by an earlier confirmation-required reply.
    #[serde(default, alias = "confirm_token", skip_serializing_if = "Option::is_none")]
    pub confirmation_token: Option<String>,
}

impl CallToolRequest {
    /// Creates a request without a token.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
            confirmation_token: None,
        }
    }

    /// Attaches a confirmation token.
    #[must_use]
    pub fn with_confirmation_token(mut self, token: impl Into<String>) -> Self {
        self.confirmation_token = Some(token.into());
        self
    }
}

/// Framed request: a method plus its params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolRequest {
    /// Method name.
    pub method: String,
    /// Method params.
    #[serde(default)]
    pub params: Value,
}

/// Error payload of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Reply envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProtocolResponse {
    /// Successful reply.
    Content {
        /// Method-specific payload.
        content: Value,
    },
    /// Failed reply.
    Error {
        /// Error details.
        error: ProtocolError,
    },
}

impl ProtocolResponse {
    /// Builds a content reply.
    #[must_use]
    pub fn content(content: Value) -> Self {
        Self::Content { content }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            error: ProtocolError {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// Returns `true` for error replies.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns the content payload, if any.
    #[must_use]
    pub fn content_value(&self) -> Option<&Value> {
        match self {
            Self::Content { content } => Some(content),
            Self::Error { .. } => None,
        }
    }

    /// Returns the error payload, if any.
    #[must_use]
    pub fn error_value(&self) -> Option<&ProtocolError> {
        match self {
            Self::Error { error } => Some(error),
            Self::Content { .. } => None,
        }
    }
}

/// Dispatches protocol requests to a gateway.
#[derive(Debug, Clone)]
pub struct ProtocolHandler {
    gateway: Arc<TrustGateway>,
}

impl ProtocolHandler {
    /// Creates a handler over `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<TrustGateway>) -> Self {
        Self { gateway }
    }

    /// Returns the gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<TrustGateway> {
        &self.gateway
    }

    /// Handles a framed request.
    pub async fn handle_request(&self, request: ProtocolRequest) -> ProtocolResponse {
        self.handle(&request.method, request.params).await
    }

    /// Handles `method` with `params`.
    pub async fn handle(&self, method: &str, params: Value) -> ProtocolResponse {
        debug!(method, "protocol request");
        match method {
            TOOLS_LIST => self.list_tools(),
            TOOLS_CALL => match serde_json::from_value::<CallToolRequest>(params) {
                Ok(request) => self.call_tool(request).await,
                Err(err) => ProtocolResponse::error(INVALID_PARAMS, err.to_string()),
            },
            other => ProtocolResponse::error(METHOD_NOT_FOUND, format!("unknown method `{other}`")),
        }
    }

    /// Lists tools as `{"tools": [descriptor, ...]}`.
    #[must_use]
    pub fn list_tools(&self) -> ProtocolResponse {
        ProtocolResponse::content(json!({ "tools": self.gateway.tool_descriptors() }))
    }

    /// Invokes a tool through the gateway.
    ///
    /// Execution failures and refusals both become error replies. A
    /// confirmation-required outcome is content, since the caller must act on it.
    pub async fn call_tool(&self, request: CallToolRequest) -> ProtocolResponse {
        let outcome = self
            .gateway
            .trusted_call_tool(
                &request.name,
                request.arguments,
                request.confirmation_token.as_deref(),
            )
            .await;

        match outcome {
            Ok(CallOutcome::Completed(result)) => match result.error() {
                Some(error) => ProtocolResponse::error(error.code(), error.message()),
                None => ProtocolResponse::content(result.into_data().unwrap_or(Value::Null)),
            },
            Ok(CallOutcome::ConfirmationRequired(confirmation)) => {
                match serde_json::to_value(&confirmation) {
                    Ok(content) => ProtocolResponse::content(content),
                    Err(err) => ProtocolResponse::error("SerializationError", err.to_string()),
                }
            }
            Err(err) => ProtocolResponse::error(err.code(), err.to_string()),
        }
    }
}
