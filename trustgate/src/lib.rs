//! Trust-gated tool invocation SDK façade.
//!
//! Bundles the gateway crates behind feature flags so downstream users can
//! pull in only the pieces they need. The `kernel` feature brings the full
//! gateway; `tools` alone gives a bare registry and executor.

#![warn(missing_docs, clippy::pedantic)]

/// Shared primitives: trust levels, confirmation tokens, arguments.
pub use gate_primitives as primitives;

/// Gateway orchestration and protocol façade (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use gate_kernel as kernel;

/// Tool registry and concurrency executor (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use gate_tools as tools;

/// Policy engines, trust state, and confirmations (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use gate_policy as policy;

/// Audit trail (enabled by `audit` feature).
#[cfg(feature = "audit")]
pub use gate_audit as audit;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use gate_telemetry as telemetry;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use gate_config as config;

/// Commonly used types.
pub mod prelude {
    pub use gate_primitives::{Arguments, ConfirmToken, TrustLevel};

    #[cfg(feature = "audit")]
    pub use gate_audit::{AuditEntry, AuditFilter, AuditStatus};
    #[cfg(feature = "config")]
    pub use gate_config::GatewayConfig;
    #[cfg(feature = "kernel")]
    pub use gate_kernel::{
        CallOutcome, CallToolRequest, GatewayError, ProtocolHandler, ProtocolResponse,
        TrustGateway,
    };
    #[cfg(feature = "policy")]
    pub use gate_policy::{PolicyDecision, PolicyEngine, SecurityError};
    #[cfg(feature = "tools")]
    pub use gate_tools::{
        ExecutionResult, Tool, ToolFailure, ToolMetadata, ToolOutput, ToolRegistry, ToolSchema,
        ValueKind,
    };
}
