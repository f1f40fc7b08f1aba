//! Trust gateway orchestration.
//!
//! [`TrustGateway`] wraps a [`gate_tools::ToolRegistry`] with trust policy,
//! two-phase confirmation for destructive tools, and an audit trail.
//! [`ProtocolHandler`] exposes it through `tools/list` and `tools/call`.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod gateway;
mod observer;
mod protocol;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{CallOutcome, ConfirmationRequest, TrustGateway};
pub use observer::{CompositePolicyObserver, PolicyObserver, TracingPolicyObserver};
pub use protocol::{
    CallToolRequest, INVALID_PARAMS, METHOD_NOT_FOUND, ProtocolError, ProtocolHandler,
    ProtocolRequest, ProtocolResponse, TOOLS_CALL, TOOLS_LIST,
};
