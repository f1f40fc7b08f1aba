//! Hooks notified of every policy decision.

use std::sync::Arc;

use gate_policy::{DecisionKind, PolicyDecision, PolicyRequest};
use tracing::{debug, warn};

/// Observer invoked whenever the policy engine produces a decision.
pub trait PolicyObserver: Send + Sync {
    /// Records the decision made for `request`.
    fn on_decision(&self, request: &PolicyRequest, decision: &PolicyDecision);
}

/// Observer that emits decisions to the tracing system.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPolicyObserver;

impl PolicyObserver for TracingPolicyObserver {
    fn on_decision(&self, request: &PolicyRequest, decision: &PolicyDecision) {
        let reason = decision.reason().unwrap_or_default();
        match decision.kind() {
            DecisionKind::Allow => {
                debug!(
                    tool = request.tool_name(),
                    trust_level = %request.trust_level(),
                    "policy allow"
                );
            }
            DecisionKind::Block => {
                warn!(
                    tool = request.tool_name(),
                    trust_level = %request.trust_level(),
                    required = %request.required_trust(),
                    reason,
                    "policy block"
                );
            }
            DecisionKind::RequireConfirmation => {
                debug!(
                    tool = request.tool_name(),
                    trust_level = %request.trust_level(),
                    reason,
                    "policy requires confirmation"
                );
            }
        }
    }
}

/// Forwards decisions to a list of observers in order.
#[derive(Default)]
pub struct CompositePolicyObserver {
    observers: Vec<Arc<dyn PolicyObserver>>,
}

impl CompositePolicyObserver {
    /// Creates a composite from the supplied observers.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn PolicyObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: Arc<dyn PolicyObserver>) {
        self.observers.push(observer);
    }

    /// Returns the number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` when no observers are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl PolicyObserver for CompositePolicyObserver {
    fn on_decision(&self, request: &PolicyRequest, decision: &PolicyDecision) {
        for observer in &self.observers {
            observer.on_decision(request, decision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use gate_primitives::TrustLevel;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl PolicyObserver for Counting {
        fn on_decision(&self, _request: &PolicyRequest, _decision: &PolicyDecision) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn composite_fans_out_to_every_observer() {
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        let mut composite = CompositePolicyObserver::new([
            first.clone() as Arc<dyn PolicyObserver>,
            Arc::new(TracingPolicyObserver),
        ]);
        composite.push(second.clone());
        assert_eq!(composite.len(), 3);

        let request = PolicyRequest::new("double", TrustLevel::Untrusted, TrustLevel::Verified);
        composite.on_decision(&request, &PolicyDecision::block("too low"));
        composite.on_decision(&request, &PolicyDecision::allow());

        assert_eq!(first.0.load(Ordering::SeqCst), 2);
        assert_eq!(second.0.load(Ordering::SeqCst), 2);
    }
}
