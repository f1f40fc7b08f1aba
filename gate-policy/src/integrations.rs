//! Best-effort trust event delivery to external systems.

use chrono::{DateTime, Utc};
use gate_primitives::TrustLevel;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::engine::{PolicyError, PolicyResult};

/// Event name emitted on every trust transition.
pub const TRUST_LEVEL_CHANGED: &str = "TRUST_LEVEL_CHANGED";

/// Trust transition notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustEvent {
    event: &'static str,
    old_level: TrustLevel,
    new_level: TrustLevel,
    at: DateTime<Utc>,
}

impl TrustEvent {
    /// Creates a `TRUST_LEVEL_CHANGED` event stamped now.
    #[must_use]
    pub fn changed(old_level: TrustLevel, new_level: TrustLevel) -> Self {
        Self {
            event: TRUST_LEVEL_CHANGED,
            old_level,
            new_level,
            at: Utc::now(),
        }
    }

    /// Returns the event name.
    #[must_use]
    pub fn event(&self) -> &'static str {
        self.event
    }

    /// Returns the level before the transition.
    #[must_use]
    pub fn old_level(&self) -> TrustLevel {
        self.old_level
    }

    /// Returns the level after the transition.
    #[must_use]
    pub fn new_level(&self) -> TrustLevel {
        self.new_level
    }

    /// Returns when the transition happened.
    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Trait implemented by event systems receiving trust transitions.
///
/// Delivery is best effort: errors are logged by the caller and never fail
/// the transition.
pub trait TrustEventSink: Send + Sync {
    /// Delivers the event.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Backend`] when the event system rejects the event.
    fn emit(&self, event: &TrustEvent) -> PolicyResult<()>;
}

/// Sink that writes trust events to the tracing system.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl TrustEventSink for TracingEventSink {
    fn emit(&self, event: &TrustEvent) -> PolicyResult<()> {
        info!(
            event = event.event(),
            old_level = %event.old_level(),
            new_level = %event.new_level(),
            "trust event emitted"
        );
        Ok(())
    }
}

/// Sink fanning trust events out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<TrustEvent>,
}

impl BroadcastEventSink {
    /// Creates a sink buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrustEvent> {
        self.sender.subscribe()
    }
}

impl TrustEventSink for BroadcastEventSink {
    fn emit(&self, event: &TrustEvent) -> PolicyResult<()> {
        self.sender
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| PolicyError::backend("no trust event subscribers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastEventSink::new(8);
        let mut receiver = sink.subscribe();

        sink.emit(&TrustEvent::changed(TrustLevel::Untrusted, TrustLevel::Trusted))
            .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event(), TRUST_LEVEL_CHANGED);
        assert_eq!(event.new_level(), TrustLevel::Trusted);
    }

    #[test]
    fn broadcast_sink_without_subscribers_reports_error() {
        let sink = BroadcastEventSink::new(1);
        let err = sink
            .emit(&TrustEvent::changed(TrustLevel::Trusted, TrustLevel::Untrusted))
            .unwrap_err();
        assert!(matches!(err, PolicyError::Backend { .. }));
    }

    #[test]
    fn event_serializes_levels() {
        let event = TrustEvent::changed(TrustLevel::Untrusted, TrustLevel::Verified);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], TRUST_LEVEL_CHANGED);
        assert_eq!(json["old_level"], "UNTRUSTED");
        assert_eq!(json["new_level"], "VERIFIED");
    }
}
