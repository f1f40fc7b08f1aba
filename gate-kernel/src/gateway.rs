//! Trust gateway: policy enforcement, confirmation, and auditing around the
//! tool registry.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use gate_audit::{AuditEntry, AuditLog, AuditResult, AuditStatus, AuditSummary};
use gate_config::GatewayConfig;
use gate_policy::{
    ConfirmationStore, DecisionKind, PolicyEngine, PolicyRequest, SecurityError, TrustEventSink,
    TrustPolicy, TrustState,
};
use gate_primitives::{Arguments, ConfirmToken, TrustLevel};
use gate_tools::{
    ConcurrencyExecutor, ExecutionResult, ExecutorConfig, ToolCall, ToolFailure, ToolMetadata,
    ToolRegistry, error_codes,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::observer::{PolicyObserver, TracingPolicyObserver};

/// Returned instead of executing when a destructive call needs confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    /// Always `true`; lets wire consumers tell this apart from a result.
    pub confirmation_required: bool,
    /// Single-use token to send back with the same call.
    pub confirm_token: ConfirmToken,
    /// Tool the token is bound to.
    pub tool_name: String,
}

/// Outcome of a gated call that was not refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallOutcome {
    /// The tool ran; the result may still be a failure.
    Completed(ExecutionResult),
    /// Nothing ran; the caller must repeat the call with the token.
    ConfirmationRequired(ConfirmationRequest),
}

impl CallOutcome {
    /// Returns the execution result, if the tool ran.
    #[must_use]
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::ConfirmationRequired(_) => None,
        }
    }

    /// Consumes the outcome, returning the execution result if the tool ran.
    #[must_use]
    pub fn into_result(self) -> Option<ExecutionResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::ConfirmationRequired(_) => None,
        }
    }

    /// Returns the confirmation request, if one was issued.
    #[must_use]
    pub fn confirmation(&self) -> Option<&ConfirmationRequest> {
        match self {
            Self::ConfirmationRequired(request) => Some(request),
            Self::Completed(_) => None,
        }
    }

    /// Returns `true` when a token was minted instead of executing.
    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::ConfirmationRequired(_))
    }
}

/// Gates every tool call through trust policy and records the outcome.
///
/// One gateway owns one trust state, so independent gateways (and tests)
/// never share trust, pending tokens, or audit history.
pub struct TrustGateway {
    registry: Arc<ToolRegistry>,
    policy: Arc<dyn PolicyEngine>,
    observer: Arc<dyn PolicyObserver>,
    trust: TrustState,
    confirmations: ConfirmationStore,
    audit: Arc<AuditLog>,
    require_confirmation: AtomicBool,
    destructive: RwLock<HashSet<String>>,
}

impl fmt::Debug for TrustGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustGateway")
            .field("trust_level", &self.trust.level())
            .field("require_confirmation", &self.confirmation_required())
            .field("tools", &self.registry.len())
            .field("audit_entries", &self.audit.len())
            .finish_non_exhaustive()
    }
}

impl Default for TrustGateway {
    fn default() -> Self {
        Self::new(Arc::new(ToolRegistry::new()))
    }
}

impl TrustGateway {
    /// Creates a gateway over `registry` with the default trust policy.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            policy: Arc::new(TrustPolicy),
            observer: Arc::new(TracingPolicyObserver),
            trust: TrustState::new(),
            confirmations: ConfirmationStore::default(),
            audit: Arc::new(AuditLog::default()),
            require_confirmation: AtomicBool::new(false),
            destructive: RwLock::default(),
        }
    }

    /// Builds a gateway and an empty registry from configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        let executor = ConcurrencyExecutor::new(ExecutorConfig::new(config.concurrency()));
        let registry = config.tool_timeouts().fold(
            ToolRegistry::new()
                .with_executor(executor)
                .with_default_timeout(config.default_timeout()),
            |registry, (name, timeout)| registry.with_timeout_override(name, timeout),
        );

        let gateway = Self::new(Arc::new(registry))
            .with_confirmation_store(ConfirmationStore::new(config.confirmation_ttl()))
            .with_audit_log(AuditLog::new(config.retention()));
        gateway.set_require_confirmation(config.require_confirmation);
        for name in &config.destructive_tools {
            gateway.mark_destructive(name.clone());
        }
        gateway
    }

    /// Replaces the policy engine.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn PolicyEngine>) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the observer notified of every policy decision. Defaults to
    /// [`TracingPolicyObserver`].
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PolicyObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the audit log, e.g. to change retention.
    #[must_use]
    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Arc::new(audit);
        self
    }

    /// Replaces the confirmation store, e.g. to change the token lifetime.
    #[must_use]
    pub fn with_confirmation_store(mut self, store: ConfirmationStore) -> Self {
        self.confirmations = store;
        self
    }

    /// Returns the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Returns the audit log.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Returns the pending-confirmation store.
    #[must_use]
    pub fn confirmations(&self) -> &ConfirmationStore {
        &self.confirmations
    }

    /// Returns registered tool names in registration order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<String> {
        self.registry.list_tools()
    }

    /// Returns listing descriptors for every tool, with gateway destructive
    /// marks applied.
    #[must_use]
    pub fn tool_descriptors(&self) -> Vec<Value> {
        self.registry
            .list()
            .iter()
            .map(|metadata| {
                let mut descriptor = metadata.descriptor();
                if self.is_destructive(metadata) {
                    descriptor["destructive"] = Value::Bool(true);
                }
                descriptor
            })
            .collect()
    }

    // Trust state.

    /// Returns the current trust level.
    #[must_use]
    pub fn get_current_trust_level(&self) -> TrustLevel {
        self.trust.level()
    }

    /// Moves to `level`, returning the previous level.
    pub fn set_level(&self, level: TrustLevel) -> TrustLevel {
        self.trust.set_level(level)
    }

    /// Grants full trust, returning the previous level.
    pub fn trust_all(&self) -> TrustLevel {
        self.trust.trust_all()
    }

    /// Returns to [`TrustLevel::Untrusted`], returning the previous level.
    pub fn reset_trust(&self) -> TrustLevel {
        self.trust.reset()
    }

    /// Installs the callback invoked with `(old, new)` on trust changes. The
    /// callback must not change the trust level itself.
    pub fn set_trust_change_callback<F>(&self, callback: F)
    where
        F: Fn(TrustLevel, TrustLevel) + Send + Sync + 'static,
    {
        self.trust.set_callback(callback);
    }

    /// Removes the trust change callback.
    pub fn clear_trust_change_callback(&self) {
        self.trust.clear_callback();
    }

    /// Registers a sink for `TRUST_LEVEL_CHANGED` events.
    pub fn add_event_sink(&self, sink: Arc<dyn TrustEventSink>) {
        self.trust.add_event_sink(sink);
    }

    // Confirmation and destructive marks.

    /// Enables or disables confirmation for destructive tools.
    pub fn set_require_confirmation(&self, enabled: bool) {
        self.require_confirmation.store(enabled, Ordering::SeqCst);
        debug!(enabled, "confirmation requirement updated");
    }

    /// Returns whether destructive tools need confirmation.
    #[must_use]
    pub fn confirmation_required(&self) -> bool {
        self.require_confirmation.load(Ordering::SeqCst)
    }

    /// Flags `name` as destructive regardless of its metadata. The tool need
    /// not be registered yet.
    pub fn mark_destructive(&self, name: impl Into<String>) {
        self.destructive
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
    }

    /// Removes a gateway destructive mark. Metadata flags are unaffected.
    pub fn unmark_destructive(&self, name: &str) -> bool {
        self.destructive
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    fn is_destructive(&self, metadata: &ToolMetadata) -> bool {
        metadata.is_destructive()
            || self
                .destructive
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(metadata.name())
    }

    /// Drops expired confirmation tokens, returning how many were removed.
    pub fn purge_expired_confirmations(&self) -> usize {
        self.confirmations.purge_expired()
    }

    // Audit.

    /// Returns audit entries filtered by tool and status, most recent last.
    #[must_use]
    pub fn get_audit_log(
        &self,
        tool_name: Option<&str>,
        status: Option<AuditStatus>,
    ) -> Vec<AuditEntry> {
        self.audit.get(tool_name, status)
    }

    /// Clears the audit log, returning how many entries were removed.
    pub fn clear_audit_log(&self) -> usize {
        self.audit.clear()
    }

    /// Summarises the audit log.
    #[must_use]
    pub fn audit_summary(&self) -> AuditSummary {
        self.audit.summary()
    }

    /// Writes the audit log to `path` as JSON lines.
    ///
    /// # Errors
    ///
    /// Propagates I/O and serialization failures.
    pub async fn export_audit_log(&self, path: impl AsRef<Path>) -> AuditResult<usize> {
        self.audit.export(path).await
    }

    /// Restores the initial state: untrusted, confirmation disabled, no
    /// pending tokens, empty audit log. Tools and destructive marks stay.
    pub fn reset(&self) {
        self.trust.reset();
        self.set_require_confirmation(false);
        let tokens = self.confirmations.clear();
        let entries = self.audit.clear();
        debug!(tokens, entries, "gateway reset");
    }

    // Dispatch.

    /// Gated call without a confirmation token.
    ///
    /// # Errors
    ///
    /// See [`TrustGateway::trusted_call_tool`].
    pub async fn call_tool(&self, name: &str, arguments: Arguments) -> GatewayResult<CallOutcome> {
        self.trusted_call_tool(name, arguments, None).await
    }

    /// Gates and executes a call.
    ///
    /// A valid `confirmation_token` authorises the call by itself and skips
    /// policy evaluation. Execution failures are returned as failed results.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ToolNotFound`] for unregistered tools and
    /// [`GatewayError::Security`] when policy blocks the call or the token is
    /// invalid, expired, or bound to another tool or other arguments.
    pub async fn trusted_call_tool(
        &self,
        name: &str,
        arguments: Arguments,
        confirmation_token: Option<&str>,
    ) -> GatewayResult<CallOutcome> {
        let Some(metadata) = self.registry.metadata(name) else {
            debug!(tool = name, "gated call for unregistered tool");
            return Err(GatewayError::ToolNotFound {
                name: name.to_owned(),
            });
        };
        let trust_level = self.trust.level();

        if let Some(token) = confirmation_token {
            if let Err(err) = self.confirmations.redeem(token, name, &arguments) {
                return Err(self.refuse(name, trust_level, err));
            }
            debug!(tool = name, "confirmation token redeemed");
            return Ok(self.dispatch(name, arguments, trust_level).await);
        }

        let destructive = self.is_destructive(&metadata);
        let request = PolicyRequest::new(
            name,
            trust_level,
            metadata.required_trust_for(destructive),
        )
        .with_destructive(destructive)
        .with_confirmation_enabled(self.confirmation_required())
        .with_arguments(arguments.clone());

        let decision = match self.policy.evaluate(&request).await {
            Ok(decision) => decision,
            Err(err) => {
                let err = SecurityError::PolicyUnavailable {
                    reason: err.to_string(),
                };
                return Err(self.refuse(name, trust_level, err));
            }
        };
        self.observer.on_decision(&request, &decision);

        match decision.kind() {
            DecisionKind::Block => {
                let err = SecurityError::Blocked {
                    tool: name.to_owned(),
                    trust_level,
                    reason: decision.reason().unwrap_or("blocked by policy").to_owned(),
                };
                Err(self.refuse(name, trust_level, err))
            }
            DecisionKind::RequireConfirmation => {
                let token = self.confirmations.mint(name, arguments);
                self.audit.append(AuditEntry::new(
                    name,
                    trust_level,
                    AuditStatus::PendingConfirmation,
                ));
                info!(tool = name, trust_level = %trust_level, "confirmation required");
                Ok(CallOutcome::ConfirmationRequired(ConfirmationRequest {
                    confirmation_required: true,
                    confirm_token: token,
                    tool_name: name.to_owned(),
                }))
            }
            DecisionKind::Allow => Ok(self.dispatch(name, arguments, trust_level).await),
        }
    }

    /// Runs the call on its own task so the terminal audit entry is written
    /// even when the awaiting caller is dropped mid-call.
    async fn dispatch(&self, name: &str, arguments: Arguments, trust_level: TrustLevel) -> CallOutcome {
        let registry = Arc::clone(&self.registry);
        let audit = Arc::clone(&self.audit);
        let tool = name.to_owned();
        let call = ToolCall::new(name, arguments);

        let task = tokio::spawn(async move {
            let result = registry.execute(call).await;
            record_completion(&audit, &tool, trust_level, &result);
            result
        });

        let result = match task.await {
            Ok(result) => result,
            Err(err) => {
                let code = if err.is_panic() {
                    error_codes::PANIC
                } else {
                    error_codes::CANCELLED
                };
                let failure = ToolFailure::new(code, format!("dispatch of `{name}` did not finish"));
                let result = ExecutionResult::failure(name, failure, Duration::ZERO);
                record_completion(&self.audit, name, trust_level, &result);
                result
            }
        };
        CallOutcome::Completed(result)
    }

    fn refuse(&self, name: &str, trust_level: TrustLevel, err: SecurityError) -> GatewayError {
        self.audit.append(
            AuditEntry::new(name, trust_level, AuditStatus::Blocked).with_error_code(err.code()),
        );
        warn!(
            tool = name,
            trust_level = %trust_level,
            error_code = err.code(),
            error = %err,
            "tool call refused"
        );
        GatewayError::Security(err)
    }
}

fn record_completion(audit: &AuditLog, name: &str, trust_level: TrustLevel, result: &ExecutionResult) {
    let status = if result.is_success() {
        AuditStatus::Success
    } else {
        AuditStatus::Failure
    };
    let mut entry = AuditEntry::new(name, trust_level, status).with_duration_ms(result.duration_ms());
    if let Some(code) = result.error_code() {
        entry = entry.with_error_code(code);
    }
    audit.append(entry);

    info!(
        tool = name,
        trust_level = %trust_level,
        status = %status,
        error_code = result.error_code(),
        duration_ms = result.duration_ms(),
        "tool call completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use gate_policy::{
        BroadcastEventSink, PolicyDecision, PolicyError, PolicyResult, PolicyRule,
        RuleBasedEngine, RuleMatcher,
    };
    use gate_tools::ToolOutput;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    fn gateway() -> TrustGateway {
        let registry = ToolRegistry::new();
        registry
            .register(ToolMetadata::new("double").unwrap(), |arguments: Arguments| async move {
                let x = arguments.get("x").and_then(Value::as_i64).unwrap_or_default();
                ToolOutput::Ok(json!(x * 2))
            })
            .unwrap();
        registry
            .register(ToolMetadata::new("delete_file").unwrap(), |arguments: Arguments| async move {
                ToolOutput::Ok(json!({ "deleted": arguments.get("path").cloned() }))
            })
            .unwrap();
        registry
            .register(ToolMetadata::new("broken").unwrap(), |_arguments: Arguments| async move {
                ToolOutput::Err(ToolFailure::new("RuntimeError", "boom"))
            })
            .unwrap();
        TrustGateway::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn trusted_call_executes_and_audits() {
        let gateway = gateway();
        gateway.trust_all();

        let outcome = gateway
            .trusted_call_tool("double", args(json!({ "x": 21 })), None)
            .await
            .unwrap();
        let result = outcome.into_result().unwrap();
        assert_eq!(result.data(), Some(&json!(42)));

        let log = gateway.get_audit_log(Some("double"), None);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].result_status(), AuditStatus::Success);
        assert_eq!(log[0].trust_level(), TrustLevel::Trusted);
    }

    #[tokio::test]
    async fn untrusted_call_is_blocked_and_audited() {
        let gateway = gateway();

        let err = gateway
            .call_tool("double", args(json!({ "x": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Security(SecurityError::Blocked { .. })));

        let log = gateway.get_audit_log(None, None);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].result_status(), AuditStatus::Blocked);
        assert_eq!(log[0].error_code(), Some("PolicyBlocked"));
    }

    #[tokio::test]
    async fn verified_level_satisfies_ordinary_tools_only() {
        let gateway = gateway();
        gateway.set_level(TrustLevel::Verified);
        gateway.mark_destructive("delete_file");

        assert!(gateway.call_tool("double", Arguments::new()).await.is_ok());
        assert!(gateway.call_tool("delete_file", Arguments::new()).await.is_err());
    }

    #[tokio::test]
    async fn unknown_tool_is_not_audited() {
        let gateway = gateway();
        gateway.trust_all();

        let err = gateway.call_tool("missing", Arguments::new()).await.unwrap_err();
        assert_eq!(err, GatewayError::ToolNotFound { name: "missing".into() });
        assert_eq!(err.code(), error_codes::TOOL_NOT_FOUND);
        assert!(gateway.audit().is_empty());
    }

    #[tokio::test]
    async fn handler_failure_is_a_failure_entry() {
        let gateway = gateway();
        gateway.trust_all();

        let outcome = gateway.call_tool("broken", Arguments::new()).await.unwrap();
        assert_eq!(outcome.result().and_then(ExecutionResult::error_code), Some("RuntimeError"));

        let log = gateway.get_audit_log(Some("broken"), Some(AuditStatus::Failure));
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].error_code(), Some("RuntimeError"));
    }

    #[tokio::test]
    async fn confirmation_round_trip() {
        let gateway = gateway();
        gateway.set_require_confirmation(true);
        gateway.mark_destructive("delete_file");
        gateway.trust_all();
        let arguments = args(json!({ "path": "/tmp/x" }));

        let first = gateway
            .call_tool("delete_file", arguments.clone())
            .await
            .unwrap();
        let request = first.confirmation().cloned().unwrap();
        assert!(request.confirmation_required);
        assert_eq!(request.tool_name, "delete_file");

        let second = gateway
            .trusted_call_tool("delete_file", arguments.clone(), Some(request.confirm_token.as_str()))
            .await
            .unwrap();
        assert!(second.result().is_some_and(ExecutionResult::is_success));

        let replay = gateway
            .trusted_call_tool("delete_file", arguments, Some(request.confirm_token.as_str()))
            .await
            .unwrap_err();
        assert_eq!(replay, GatewayError::Security(SecurityError::InvalidToken));

        let summary = gateway.audit_summary();
        assert_eq!(summary.pending_confirmation, 1);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.blocked, 1);
    }

    #[tokio::test]
    async fn token_bound_to_other_tool_is_rejected_and_kept() {
        let gateway = gateway();
        gateway.set_require_confirmation(true);
        gateway.mark_destructive("delete_file");
        gateway.trust_all();

        let outcome = gateway.call_tool("delete_file", Arguments::new()).await.unwrap();
        let token = outcome.confirmation().unwrap().confirm_token.clone();

        let err = gateway
            .trusted_call_tool("double", Arguments::new(), Some(token.as_str()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match tool"));
        assert_eq!(gateway.confirmations().pending_count(), 1);

        let blocked = gateway.get_audit_log(Some("double"), Some(AuditStatus::Blocked));
        assert_eq!(blocked[0].error_code(), Some("ConfirmTokenToolMismatch"));
    }

    #[tokio::test]
    async fn token_authorises_even_after_trust_drops() {
        let gateway = gateway();
        gateway.set_require_confirmation(true);
        gateway.mark_destructive("delete_file");
        gateway.trust_all();

        let outcome = gateway.call_tool("delete_file", Arguments::new()).await.unwrap();
        let token = outcome.confirmation().unwrap().confirm_token.clone();
        gateway.reset_trust();

        let outcome = gateway
            .trusted_call_tool("delete_file", Arguments::new(), Some(token.as_str()))
            .await
            .unwrap();
        assert!(outcome.result().is_some());
        assert_eq!(
            gateway.get_audit_log(Some("delete_file"), Some(AuditStatus::Success))[0].trust_level(),
            TrustLevel::Untrusted
        );
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let gateway = gateway();
        let err = gateway
            .trusted_call_tool("double", Arguments::new(), Some("not-a-token"))
            .await
            .unwrap_err();
        assert_eq!(err.as_security(), Some(&SecurityError::InvalidToken));
        assert_eq!(gateway.audit().len(), 1);
    }

    #[tokio::test]
    async fn destructive_without_confirmation_just_needs_trust() {
        let gateway = gateway();
        gateway.mark_destructive("delete_file");
        gateway.trust_all();

        let outcome = gateway.call_tool("delete_file", Arguments::new()).await.unwrap();
        assert!(!outcome.requires_confirmation());

        assert!(gateway.unmark_destructive("delete_file"));
        gateway.set_level(TrustLevel::Verified);
        assert!(gateway.call_tool("delete_file", Arguments::new()).await.is_ok());
    }

    #[tokio::test]
    async fn trust_callback_sees_transitions() {
        let gateway = gateway();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        gateway.set_trust_change_callback(move |old, new| {
            sink.lock().unwrap().push((old, new));
        });
        let events = Arc::new(BroadcastEventSink::new(8));
        let mut receiver = events.subscribe();
        gateway.add_event_sink(events);

        gateway.trust_all();
        gateway.trust_all();
        gateway.reset_trust();

        assert_eq!(
            *seen.lock().unwrap(),
            [
                (TrustLevel::Untrusted, TrustLevel::Trusted),
                (TrustLevel::Trusted, TrustLevel::Untrusted),
            ]
        );
        assert_eq!(receiver.recv().await.unwrap().new_level(), TrustLevel::Trusted);
    }

    struct FailingEngine;

    #[async_trait]
    impl PolicyEngine for FailingEngine {
        async fn evaluate(&self, _request: &PolicyRequest) -> PolicyResult<PolicyDecision> {
            Err(PolicyError::backend("rules offline"))
        }
    }

    #[tokio::test]
    async fn engine_errors_fail_closed() {
        let gateway = gateway().with_policy(Arc::new(FailingEngine));
        gateway.trust_all();

        let err = gateway.call_tool("double", Arguments::new()).await.unwrap_err();
        assert_eq!(err.code(), "PolicyUnavailable");
        assert_eq!(gateway.audit_summary().blocked, 1);
    }

    #[tokio::test]
    async fn rule_engine_overrides_trust_policy() {
        let engine = RuleBasedEngine::default();
        engine.add_rule(PolicyRule::new(
            "no-broken",
            RuleMatcher::for_tool("broken"),
            PolicyDecision::block("disabled"),
        )
        .unwrap());
        let gateway = gateway().with_policy(Arc::new(engine));
        gateway.trust_all();

        assert!(gateway.call_tool("broken", Arguments::new()).await.is_err());
        assert!(gateway.call_tool("double", Arguments::new()).await.is_ok());
    }

    #[tokio::test]
    async fn reset_restores_initial_state() {
        let gateway = gateway();
        gateway.trust_all();
        gateway.set_require_confirmation(true);
        gateway.mark_destructive("delete_file");
        gateway.call_tool("delete_file", Arguments::new()).await.unwrap();

        gateway.reset();

        assert_eq!(gateway.get_current_trust_level(), TrustLevel::Untrusted);
        assert!(!gateway.confirmation_required());
        assert_eq!(gateway.confirmations().pending_count(), 0);
        assert!(gateway.audit().is_empty());
        assert_eq!(gateway.list_tools(), ["double", "delete_file", "broken"]);
    }

    #[tokio::test]
    async fn from_config_applies_settings() {
        let mut config = GatewayConfig {
            require_confirmation: true,
            audit_retention: Some(2),
            ..GatewayConfig::default()
        };
        config.destructive_tools.insert("wipe".into());
        config.tool_timeouts_ms.insert("wipe".into(), 20);

        let gateway = TrustGateway::from_config(&config);
        gateway
            .registry()
            .register(ToolMetadata::new("wipe").unwrap(), |_arguments: Arguments| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                ToolOutput::Ok(Value::Null)
            })
            .unwrap();
        gateway.trust_all();

        let descriptors = gateway.tool_descriptors();
        assert_eq!(descriptors[0]["destructive"], json!(true));

        let outcome = gateway.call_tool("wipe", Arguments::new()).await.unwrap();
        let token = outcome.confirmation().unwrap().confirm_token.clone();
        let outcome = gateway
            .trusted_call_tool("wipe", Arguments::new(), Some(token.as_str()))
            .await
            .unwrap();
        assert_eq!(
            outcome.result().and_then(ExecutionResult::error_code),
            Some(error_codes::TIMEOUT)
        );
        assert_eq!(gateway.audit().retention().map(std::num::NonZeroUsize::get), Some(2));
    }

    #[derive(Default)]
    struct CountingObserver {
        allowed: AtomicUsize,
        refused: AtomicUsize,
    }

    impl PolicyObserver for CountingObserver {
        fn on_decision(&self, _request: &PolicyRequest, decision: &PolicyDecision) {
            let counter = match decision.kind() {
                DecisionKind::Allow => &self.allowed,
                DecisionKind::Block | DecisionKind::RequireConfirmation => &self.refused,
            };
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn installed_observer_replaces_tracing_default() {
        let observer = Arc::new(CountingObserver::default());
        let gateway = gateway().with_observer(observer.clone());

        assert!(gateway.call_tool("double", Arguments::new()).await.is_err());
        gateway.trust_all();
        gateway.call_tool("double", Arguments::new()).await.unwrap();
        assert!(gateway.trusted_call_tool("double", Arguments::new(), Some("bogus")).await.is_err());

        assert_eq!(observer.allowed.load(Ordering::SeqCst), 1);
        assert_eq!(observer.refused.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_caller_still_gets_terminal_audit_entry() {
        let executor = ConcurrencyExecutor::new(ExecutorConfig::new(std::num::NonZeroUsize::MIN));
        let registry = ToolRegistry::new()
            .with_executor(executor)
            .with_timeout_override("stall", Duration::from_millis(50));
        registry
            .register(ToolMetadata::new("stall").unwrap(), |_arguments: Arguments| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                ToolOutput::Ok(Value::Null)
            })
            .unwrap();
        let gateway = TrustGateway::new(Arc::new(registry));
        gateway.trust_all();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), gateway.call_tool("stall", Arguments::new()))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let failures = gateway.get_audit_log(Some("stall"), Some(AuditStatus::Failure));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error_code(), Some(error_codes::TIMEOUT));
        assert_eq!(gateway.registry().executor().available_permits(), 1);
    }
}
