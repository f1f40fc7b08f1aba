//! Single-use confirmation tokens for destructive calls.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gate_primitives::{Arguments, ConfirmToken};
use tracing::{debug, warn};

use crate::security::SecurityError;

/// Lifetime of a minted token when none is configured.
pub const DEFAULT_CONFIRMATION_TTL: Duration = Duration::from_secs(300);

/// A destructive call awaiting confirmation.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    token: ConfirmToken,
    tool_name: String,
    arguments: Arguments,
    minted_at: DateTime<Utc>,
    minted: Instant,
    ttl: Duration,
}

impl PendingConfirmation {
    /// Returns the token.
    #[must_use]
    pub fn token(&self) -> &ConfirmToken {
        &self.token
    }

    /// Returns the tool the token is bound to.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the arguments the token is bound to.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Returns the wall-clock mint time.
    #[must_use]
    pub fn minted_at(&self) -> DateTime<Utc> {
        self.minted_at
    }

    /// Returns the wall-clock expiry, if representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.minted_at.checked_add_signed(ttl))
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.minted) >= self.ttl
    }
}

/// Pending-token table.
///
/// Every check-and-consume happens under one lock, so concurrent redemptions
/// of the same token have exactly one winner.
#[derive(Debug)]
pub struct ConfirmationStore {
    pending: Mutex<HashMap<ConfirmToken, PendingConfirmation>>,
    ttl: Duration,
}

impl Default for ConfirmationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_TTL)
    }
}

impl ConfirmationStore {
    /// Creates a store whose tokens expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the token lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConfirmToken, PendingConfirmation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mints a token bound to `tool_name` and `arguments`.
    pub fn mint(&self, tool_name: impl Into<String>, arguments: Arguments) -> ConfirmToken {
        let token = ConfirmToken::generate();
        let pending = PendingConfirmation {
            token: token.clone(),
            tool_name: tool_name.into(),
            arguments,
            minted_at: Utc::now(),
            minted: Instant::now(),
            ttl: self.ttl,
        };
        debug!(tool = %pending.tool_name, "confirmation token minted");
        self.lock().insert(token.clone(), pending);
        token
    }

    /// Consumes `token` for a call to `tool_name` with `arguments`.
    ///
    /// A mismatched redemption leaves the token pending for its rightful call.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::InvalidToken`] for unknown, malformed, spent or
    /// expired tokens, [`SecurityError::ToolMismatch`] when the token belongs to
    /// another tool, and [`SecurityError::ArgumentsMismatch`] when the
    /// arguments differ from those it was minted for.
    pub fn redeem(
        &self,
        token: &str,
        tool_name: &str,
        arguments: &Arguments,
    ) -> Result<PendingConfirmation, SecurityError> {
        let token: ConfirmToken = token.parse().map_err(|_| SecurityError::InvalidToken)?;
        let mut pending = self.lock();

        let Some(entry) = pending.get(&token) else {
            return Err(SecurityError::InvalidToken);
        };

        if entry.is_expired(Instant::now()) {
            pending.remove(&token);
            debug!(tool = tool_name, "expired confirmation token presented");
            return Err(SecurityError::InvalidToken);
        }

        if entry.tool_name != tool_name {
            warn!(
                tool = tool_name,
                bound_tool = %entry.tool_name,
                "confirmation token presented for another tool"
            );
            return Err(SecurityError::ToolMismatch {
                tool: tool_name.to_owned(),
            });
        }

        if &entry.arguments != arguments {
            warn!(tool = tool_name, "confirmation token presented with different arguments");
            return Err(SecurityError::ArgumentsMismatch {
                tool: tool_name.to_owned(),
            });
        }

        pending.remove(&token).ok_or(SecurityError::InvalidToken)
    }

    /// Returns the number of tokens awaiting redemption, expired or not.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Drops expired tokens, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, entry| !entry.is_expired(now));
        before - pending.len()
    }

    /// Drops every pending token, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut pending = self.lock();
        let removed = pending.len();
        pending.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{Value, json};

    fn arguments(value: Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn token_round_trip_is_single_use() {
        let store = ConfirmationStore::default();
        let args = arguments(json!({ "path": "/tmp/a" }));
        let token = store.mint("delete_file", args.clone());

        let pending = store.redeem(token.as_str(), "delete_file", &args).unwrap();
        assert_eq!(pending.tool_name(), "delete_file");
        assert!(pending.expires_at().is_some_and(|at| at > pending.minted_at()));

        let err = store
            .redeem(token.as_str(), "delete_file", &args)
            .unwrap_err();
        assert_eq!(err, SecurityError::InvalidToken);
    }

    #[test]
    fn token_is_bound_to_tool_and_arguments() {
        let store = ConfirmationStore::default();
        let args = arguments(json!({ "path": "/tmp/a" }));
        let token = store.mint("delete_file", args.clone());

        let err = store.redeem(token.as_str(), "format_disk", &args).unwrap_err();
        assert!(matches!(err, SecurityError::ToolMismatch { .. }));

        let other = arguments(json!({ "path": "/etc" }));
        let err = store.redeem(token.as_str(), "delete_file", &other).unwrap_err();
        assert!(matches!(err, SecurityError::ArgumentsMismatch { .. }));

        assert!(store.redeem(token.as_str(), "delete_file", &args).is_ok());
    }

    #[test]
    fn expired_and_unknown_tokens_are_invalid() {
        let store = ConfirmationStore::new(Duration::ZERO);
        let token = store.mint("delete_file", Arguments::new());
        let err = store
            .redeem(token.as_str(), "delete_file", &Arguments::new())
            .unwrap_err();
        assert_eq!(err, SecurityError::InvalidToken);
        assert_eq!(store.pending_count(), 0);

        let err = store
            .redeem("not-a-token", "delete_file", &Arguments::new())
            .unwrap_err();
        assert_eq!(err, SecurityError::InvalidToken);
    }

    #[test]
    fn purge_and_clear_drop_tokens() {
        let expiring = ConfirmationStore::new(Duration::ZERO);
        expiring.mint("a", Arguments::new());
        expiring.mint("b", Arguments::new());
        assert_eq!(expiring.purge_expired(), 2);

        let store = ConfirmationStore::default();
        store.mint("a", Arguments::new());
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.clear(), 1);
    }

    #[test]
    fn concurrent_redemption_has_one_winner() {
        let store = ConfirmationStore::default();
        let token = store.mint("delete_file", Arguments::new());
        let winners = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    if store
                        .redeem(token.as_str(), "delete_file", &Arguments::new())
                        .is_ok()
                    {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
