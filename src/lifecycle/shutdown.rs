//! Shutdown coordination.

use tokio::sync::broadcast;

use crate::observability::{TelemetryEvent, TelemetryPublisher};

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self, reason: &str) {
        tracing::info!(reason, subscribers = self.tx.receiver_count(), "Shutdown triggered");
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Final teardown: record the stop and flush telemetry.
    pub fn complete(&self, telemetry: &TelemetryPublisher) {
        telemetry.publish(TelemetryEvent::lifecycle("ServiceStopped", "service stopped"));
        telemetry.flush();
        tracing::info!("Shutdown complete");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelemetrySettings;
    use crate::observability::{EventKind, MemorySink};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.clone().subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger("test");

        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn test_complete_publishes_stop_event() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = TelemetryPublisher::with_sinks(TelemetrySettings::default(), vec![sink.clone()]);

        Shutdown::new().complete(&telemetry);

        let events = sink.events_of_kind(EventKind::Lifecycle);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "ServiceStopped");
    }
}
