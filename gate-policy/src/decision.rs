//! Policy decision types returned by engines.

use serde::{Deserialize, Serialize};

/// Describes the outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Call may be dispatched immediately.
    Allow,
    /// Call is rejected outright.
    Block,
    /// Call must be confirmed with a single-use token before it runs.
    RequireConfirmation,
}

/// Structured decision emitted by a policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl PolicyDecision {
    /// Returns an allow decision with no additional context.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            kind: DecisionKind::Allow,
            reason: None,
        }
    }

    /// Returns a block decision with an explanatory reason.
    #[must_use]
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Block,
            reason: Some(reason.into()),
        }
    }

    /// Returns a decision requiring confirmation before execution.
    #[must_use]
    pub fn require_confirmation(reason: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::RequireConfirmation,
            reason: Some(reason.into()),
        }
    }

    /// Returns the decision kind.
    #[must_use]
    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Returns true when the decision allows the call to proceed.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.kind == DecisionKind::Allow
    }

    /// Returns true when the decision blocks the call.
    #[must_use]
    pub fn is_block(&self) -> bool {
        self.kind == DecisionKind::Block
    }

    /// Returns true when a confirmation token must be minted.
    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        self.kind == DecisionKind::RequireConfirmation
    }

    /// Returns the optional reason associated with the decision.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_helpers_work() {
        let allow = PolicyDecision::allow();
        assert!(allow.is_allow());
        assert!(!allow.is_block());

        let block = PolicyDecision::block("untrusted");
        assert!(block.is_block());
        assert_eq!(block.reason(), Some("untrusted"));

        let confirm = PolicyDecision::require_confirmation("destructive");
        assert!(confirm.requires_confirmation());
        assert_eq!(
            serde_json::to_value(&confirm).unwrap()["kind"],
            "require_confirmation"
        );
    }
}
