//! Policy engine traits and implementations.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use gate_primitives::TrustLevel;
use thiserror::Error;
use tracing::debug;

use crate::contracts::PolicyRequest;
use crate::decision::PolicyDecision;

/// Errors surfaced by policy engines and their integrations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Rule configuration error.
    #[error("invalid policy rule: {0}")]
    InvalidRule(&'static str),
    /// Backend integration returned an error.
    #[error("policy backend failure: {reason}")]
    Backend {
        /// Human-readable explanation for logging and operators.
        reason: String,
    },
}

impl PolicyError {
    /// Creates a backend error from the supplied reason.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Trait implemented by policy engines.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Evaluates the supplied policy request.
    async fn evaluate(&self, request: &PolicyRequest) -> PolicyResult<PolicyDecision>;
}

/// Default engine: blocks calls below the tool's minimum trust level, then
/// requires confirmation for destructive tools while confirmation is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustPolicy;

#[async_trait]
impl PolicyEngine for TrustPolicy {
    async fn evaluate(&self, request: &PolicyRequest) -> PolicyResult<PolicyDecision> {
        if !request.trust_level().satisfies(request.required_trust()) {
            return Ok(PolicyDecision::block(format!(
                "trust level {} is below required {}",
                request.trust_level(),
                request.required_trust()
            )));
        }

        if request.confirmation_enabled() && request.is_destructive() {
            return Ok(PolicyDecision::require_confirmation(
                "destructive tool requires confirmation",
            ));
        }

        Ok(PolicyDecision::allow())
    }
}

/// Selects the tools a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolMatcher {
    /// Every tool.
    Any,
    /// One tool by exact name.
    Named(String),
    /// Tools whose name starts with the prefix.
    Prefix(String),
    /// Tools flagged destructive.
    Destructive,
}

impl ToolMatcher {
    fn matches(&self, request: &PolicyRequest) -> bool {
        match self {
            Self::Any => true,
            Self::Named(name) => request.tool_name() == name,
            Self::Prefix(prefix) => request.tool_name().starts_with(prefix.as_str()),
            Self::Destructive => request.is_destructive(),
        }
    }
}

/// Matches a policy request by tool and, optionally, by a trust ceiling.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    tool: ToolMatcher,
    below: Option<TrustLevel>,
}

impl RuleMatcher {
    /// Creates a matcher that accepts all tools.
    #[must_use]
    pub fn any() -> Self {
        Self {
            tool: ToolMatcher::Any,
            below: None,
        }
    }

    /// Creates a matcher targeting a specific tool name.
    #[must_use]
    pub fn for_tool(name: impl Into<String>) -> Self {
        Self {
            tool: ToolMatcher::Named(name.into()),
            below: None,
        }
    }

    /// Creates a matcher targeting tools sharing a name prefix.
    #[must_use]
    pub fn for_prefix(prefix: impl Into<String>) -> Self {
        Self {
            tool: ToolMatcher::Prefix(prefix.into()),
            below: None,
        }
    }

    /// Creates a matcher targeting destructive tools.
    #[must_use]
    pub fn for_destructive() -> Self {
        Self {
            tool: ToolMatcher::Destructive,
            below: None,
        }
    }

    /// Restricts the matcher to calls made below the supplied trust level.
    #[must_use]
    pub fn below(mut self, level: TrustLevel) -> Self {
        self.below = Some(level);
        self
    }

    fn matches(&self, request: &PolicyRequest) -> bool {
        self.tool.matches(request)
            && self
                .below
                .is_none_or(|ceiling| request.trust_level() < ceiling)
    }
}

/// Rule consisting of a matcher and a resulting decision.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    name: String,
    matcher: RuleMatcher,
    decision: PolicyDecision,
}

impl PolicyRule {
    /// Creates a new rule with the supplied matcher and decision.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRule`] when the rule name is empty.
    pub fn new(
        name: impl Into<String>,
        matcher: RuleMatcher,
        decision: PolicyDecision,
    ) -> PolicyResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PolicyError::InvalidRule("rule name cannot be empty"));
        }

        Ok(Self {
            name,
            matcher,
            decision,
        })
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the decision attached to the rule.
    #[must_use]
    pub fn decision(&self) -> &PolicyDecision {
        &self.decision
    }
}

/// First-match rule overrides layered over a fallback engine.
pub struct RuleBasedEngine {
    rules: RwLock<Vec<PolicyRule>>,
    fallback: Arc<dyn PolicyEngine>,
}

impl std::fmt::Debug for RuleBasedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let names: Vec<_> = rules.iter().map(PolicyRule::name).collect();
        f.debug_struct("RuleBasedEngine")
            .field("rules", &names)
            .finish_non_exhaustive()
    }
}

impl Default for RuleBasedEngine {
    fn default() -> Self {
        Self::new(Arc::new(TrustPolicy))
    }
}

impl RuleBasedEngine {
    /// Constructs an engine deferring to `fallback` when no rule matches.
    #[must_use]
    pub fn new(fallback: Arc<dyn PolicyEngine>) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            fallback,
        }
    }

    /// Adds a rule to the engine in insertion order.
    pub fn add_rule(&self, rule: PolicyRule) {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rule);
    }

    /// Returns the number of configured rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn first_match(&self, request: &PolicyRequest) -> Option<PolicyDecision> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules.iter().find(|rule| rule.matcher.matches(request)).map(|rule| {
            debug!(rule = rule.name(), subject = %request.label(), "policy rule matched");
            rule.decision.clone()
        })
    }
}

#[async_trait]
impl PolicyEngine for RuleBasedEngine {
    async fn evaluate(&self, request: &PolicyRequest) -> PolicyResult<PolicyDecision> {
        if let Some(decision) = self.first_match(request) {
            return Ok(decision);
        }
        self.fallback.evaluate(request).await
    }
}
