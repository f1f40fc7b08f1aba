//! Process trust state machine.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use gate_primitives::TrustLevel;
use tracing::{info, warn};

use crate::integrations::{TrustEvent, TrustEventSink};

/// Callback invoked with `(old, new)` on every trust change.
pub type TrustChangeCallback = Arc<dyn Fn(TrustLevel, TrustLevel) + Send + Sync>;

/// Trust state owned by one gateway.
///
/// Starts at [`TrustLevel::Untrusted`] and only moves through
/// [`TrustState::set_level`], [`TrustState::trust_all`] and
/// [`TrustState::reset`]. Transitions are serialized, so observers see
/// `(old, new)` pairs in the order the level changed. Notifications run after
/// the level lock is released: callbacks may read the level but must not
/// change it.
#[derive(Default)]
pub struct TrustState {
    transitions: Mutex<()>,
    level: Mutex<TrustLevel>,
    callback: RwLock<Option<TrustChangeCallback>>,
    sinks: RwLock<Vec<Arc<dyn TrustEventSink>>>,
}

impl std::fmt::Debug for TrustState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustState")
            .field("level", &self.level())
            .finish_non_exhaustive()
    }
}

impl TrustState {
    /// Creates an untrusted state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current level.
    #[must_use]
    pub fn level(&self) -> TrustLevel {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs the transition callback, replacing any previous one.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(TrustLevel, TrustLevel) + Send + Sync + 'static,
    {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Removes the transition callback.
    pub fn clear_callback(&self) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Registers an event sink receiving `TRUST_LEVEL_CHANGED` events.
    pub fn add_event_sink(&self, sink: Arc<dyn TrustEventSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Moves to `level`, returning the previous level.
    pub fn set_level(&self, level: TrustLevel) -> TrustLevel {
        let _transition = self.transitions.lock().unwrap_or_else(PoisonError::into_inner);
        let old = {
            let mut guard = self.level.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, level)
        };

        if old != level {
            info!(old_level = %old, new_level = %level, "trust level changed");
            self.notify(old, level);
        }
        old
    }

    /// Grants full trust.
    pub fn trust_all(&self) -> TrustLevel {
        self.set_level(TrustLevel::Trusted)
    }

    /// Returns to the initial untrusted state.
    pub fn reset(&self) -> TrustLevel {
        self.set_level(TrustLevel::Untrusted)
    }

    fn notify(&self, old: TrustLevel, new: TrustLevel) {
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(old, new);
        }

        let sinks = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if sinks.is_empty() {
            return;
        }

        let event = TrustEvent::changed(old, new);
        for sink in sinks {
            if let Err(err) = sink.emit(&event) {
                warn!(error = %err, "trust event delivery failed");
            }
        }
    }
}
