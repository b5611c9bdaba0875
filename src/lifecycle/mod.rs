//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Created → ConfiguringServices → ConfiguringPipeline → Running
//!                       └────────────────┴──→ FailedStartup
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Flush telemetry
//! ```
//!
//! # Design Decisions
//! - Ordered startup: configuration and telemetry first, listeners last
//! - Shutdown has a grace period: the server stops waiting after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_listener;
pub use startup::{
    AssembledPipeline, PipelineAssembler, Severity, StartupError, StartupFailure, StartupPhase,
    StartupReport,
};
