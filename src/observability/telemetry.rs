//! Process-wide telemetry publisher.
//!
//! # Responsibilities
//! - Turn errors into structured exception events
//! - Fan events out to the configured sinks
//! - Flush sinks at process exit
//!
//! # Design Decisions
//! - Created once from `TelemetrySettings`, then cloned into every component
//!   that emits events (cheap: `Arc` inside)
//! - Safe for concurrent `publish` calls from request-handling tasks
//! - The remote transport is a `TelemetrySink`; this crate ships a tracing
//!   sink and an in-memory sink only

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::TelemetrySettings;
use crate::observability::metrics;

/// Category of a telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Exception,
    Diagnostic,
    Lifecycle,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Exception => "exception",
            EventKind::Diagnostic => "diagnostic",
            EventKind::Lifecycle => "lifecycle",
        }
    }
}

/// A structured event handed to sinks.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub name: String,
    pub message: String,
    pub properties: BTreeMap<String, String>,
}

impl TelemetryEvent {
    fn new(kind: EventKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            name: name.into(),
            message: message.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Build an exception event from an error, recording its source chain.
    pub fn exception<E: Error + ?Sized>(err: &E) -> Self {
        let mut event = Self::new(EventKind::Exception, "ExceptionEvent", err.to_string());

        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        if !chain.is_empty() {
            event
                .properties
                .insert("error_chain".to_string(), chain.join(" <- "));
        }
        event
    }

    pub fn diagnostic(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventKind::Diagnostic, name, message)
    }

    pub fn lifecycle(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventKind::Lifecycle, name, message)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Delivery target for telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn deliver(&self, event: &TelemetryEvent);

    /// Push out anything buffered. Called once at process exit.
    fn flush(&self) {}
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn deliver(&self, event: &TelemetryEvent) {
        match event.kind {
            EventKind::Exception => tracing::error!(
                event_id = %event.id,
                event = %event.name,
                properties = ?event.properties,
                "{}", event.message
            ),
            EventKind::Diagnostic => tracing::warn!(
                event_id = %event.id,
                event = %event.name,
                properties = ?event.properties,
                "{}", event.message
            ),
            EventKind::Lifecycle => tracing::info!(
                event_id = %event.id,
                event = %event.name,
                properties = ?event.properties,
                "{}", event.message
            ),
        }
    }
}

/// Keeps delivered events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_of_kind(&self, kind: EventKind) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

impl TelemetrySink for MemorySink {
    fn deliver(&self, event: &TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

struct PublisherInner {
    settings: TelemetrySettings,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    published: AtomicU64,
}

/// Process-wide sink for structured events and exceptions.
#[derive(Clone)]
pub struct TelemetryPublisher {
    inner: Arc<PublisherInner>,
}

impl fmt::Debug for TelemetryPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryPublisher")
            .field("settings", &self.inner.settings)
            .field("sinks", &self.inner.sinks.len())
            .field("published", &self.published_count())
            .finish()
    }
}

impl TelemetryPublisher {
    pub fn with_sinks(settings: TelemetrySettings, sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        if settings.instrumentation_key.is_empty() {
            tracing::warn!("Telemetry instrumentation key is empty; events stay local");
        }
        Self {
            inner: Arc::new(PublisherInner {
                settings,
                sinks,
                published: AtomicU64::new(0),
            }),
        }
    }

    /// True when no instrumentation key is configured.
    pub fn is_local_only(&self) -> bool {
        self.inner.settings.instrumentation_key.is_empty()
    }

    pub fn publish(&self, event: TelemetryEvent) {
        for sink in &self.inner.sinks {
            sink.deliver(&event);
        }
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        metrics::record_telemetry_event(event.kind.as_str());
    }

    /// Number of events published since construction.
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Flush every sink. Part of process teardown.
    pub fn flush(&self) {
        for sink in &self.inner.sinks {
            sink.flush();
        }
        tracing::debug!(published = self.published_count(), "Telemetry flushed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("inner failure")]
    struct Inner;

    fn publisher_with_memory() -> (TelemetryPublisher, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let publisher = TelemetryPublisher::with_sinks(TelemetrySettings::default(), vec![sink.clone()]);
        (publisher, sink)
    }

    #[test]
    fn test_exception_event_records_source_chain() {
        let event = TelemetryEvent::exception(&Outer(Inner));
        assert_eq!(event.kind, EventKind::Exception);
        assert_eq!(event.message, "outer failure");
        assert_eq!(event.properties["error_chain"], "inner failure");
    }

    #[test]
    fn test_publish_reaches_every_sink() {
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let publisher = TelemetryPublisher::with_sinks(
            TelemetrySettings::default(),
            vec![first.clone(), second.clone()],
        );

        publisher.publish(TelemetryEvent::diagnostic("Probe", "hello").with_property("k", "v"));

        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events()[0].properties["k"], "v");
        assert_eq!(publisher.published_count(), 1);
    }

    #[test]
    fn test_published_exception_keeps_event_id() {
        let (publisher, sink) = publisher_with_memory();
        let event = TelemetryEvent::exception(&Inner);
        let id = event.id;
        publisher.publish(event);
        assert_eq!(sink.events_of_kind(EventKind::Exception)[0].id, id);
        assert!(publisher.is_local_only());
    }

    #[test]
    fn test_concurrent_publish() {
        let (publisher, sink) = publisher_with_memory();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let publisher = publisher.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        publisher.publish(TelemetryEvent::lifecycle("Tick", format!("thread {}", i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.events().len(), 200);
        assert_eq!(publisher.published_count(), 200);
    }
}
