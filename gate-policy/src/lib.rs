//! Trust-gated policy evaluation for tool calls.
//!
//! This crate holds the process trust state machine, the engines that turn a
//! call request into an allow/block/require-confirmation decision, and the
//! single-use confirmation token table used for destructive tools.

#![warn(missing_docs, clippy::pedantic)]

pub mod confirm;
pub mod contracts;
pub mod decision;
pub mod engine;
pub mod integrations;
pub mod security;
pub mod trust;

pub use confirm::{ConfirmationStore, DEFAULT_CONFIRMATION_TTL, PendingConfirmation};
pub use contracts::PolicyRequest;
pub use decision::{DecisionKind, PolicyDecision};
pub use engine::{
    PolicyEngine, PolicyError, PolicyResult, PolicyRule, RuleBasedEngine, RuleMatcher,
    ToolMatcher, TrustPolicy,
};
pub use integrations::{
    BroadcastEventSink, TRUST_LEVEL_CHANGED, TracingEventSink, TrustEvent, TrustEventSink,
};
pub use security::SecurityError;
pub use trust::{TrustChangeCallback, TrustState};
