//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup sequence and request pipeline produce:
//!     → logging.rs (structured log events via tracing)
//!     → telemetry.rs (exception / diagnostic events → TelemetrySink)
//!     → metrics.rs (counters via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - One TelemetryPublisher per process, created before service configuration
//! - The publisher is passed explicitly; there is no global instance
//! - Request ID flows through request spans

pub mod logging;
pub mod metrics;
pub mod telemetry;

pub use telemetry::{
    EventKind, MemorySink, TelemetryEvent, TelemetryPublisher, TelemetrySink, TracingSink,
};
