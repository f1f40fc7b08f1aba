//! Policy request contract evaluated for every unconfirmed call.

use gate_primitives::{Arguments, TrustLevel};
use serde::{Deserialize, Serialize};

/// Full request sent to the policy engine for evaluation.
///
/// The trust level is captured once at dispatch; later transitions do not
/// affect a request already built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRequest {
    tool_name: String,
    trust_level: TrustLevel,
    required_trust: TrustLevel,
    #[serde(default)]
    destructive: bool,
    #[serde(default)]
    confirmation_enabled: bool,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    arguments: Arguments,
}

impl PolicyRequest {
    /// Creates a request for a tool call made at `trust_level`.
    #[must_use]
    pub fn new(
        tool_name: impl Into<String>,
        trust_level: TrustLevel,
        required_trust: TrustLevel,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            trust_level,
            required_trust,
            destructive: false,
            confirmation_enabled: false,
            arguments: Arguments::new(),
        }
    }

    /// Marks whether the targeted tool is destructive.
    #[must_use]
    pub fn with_destructive(mut self, destructive: bool) -> Self {
        self.destructive = destructive;
        self
    }

    /// Records whether confirmation is globally enabled.
    #[must_use]
    pub fn with_confirmation_enabled(mut self, enabled: bool) -> Self {
        self.confirmation_enabled = enabled;
        self
    }

    /// Attaches the call arguments for engines that inspect them.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Returns the targeted tool name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the trust level captured at dispatch.
    #[must_use]
    pub fn trust_level(&self) -> TrustLevel {
        self.trust_level
    }

    /// Returns the tool's minimum trust level.
    #[must_use]
    pub fn required_trust(&self) -> TrustLevel {
        self.required_trust
    }

    /// Returns `true` when the tool is destructive.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.destructive
    }

    /// Returns `true` when confirmation is globally enabled.
    #[must_use]
    pub fn confirmation_enabled(&self) -> bool {
        self.confirmation_enabled
    }

    /// Returns the call arguments.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Returns a concise label for logs.
    #[must_use]
    pub fn label(&self) -> String {
        format!("tool `{}`", self.tool_name)
    }
}
