//! API service bootstrap library.
//!
//! Wires configuration, telemetry, scope-based authorization and API
//! documentation into a running axum pipeline.
//!
//! # Architecture Overview
//!
//! ```text
//!   appsettings.toml ──▶ config ──▶ lifecycle::startup (PipelineAssembler)
//!                                        │
//!              ┌─────────────────────────┼──────────────────────────┐
//!              ▼                         ▼                          ▼
//!      observability              security                        docs
//!      (telemetry, logs)   (policy, gate, bearer auth)    (artifact → OpenAPI)
//!              │                         │                          │
//!              └──────────────▶ http (exceptions, probe, routes, server)
//! ```

// Core subsystems
pub mod config;
pub mod docs;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ConfigurationSource;
pub use http::HttpServer;
pub use lifecycle::{PipelineAssembler, Shutdown, StartupPhase};
pub use observability::TelemetryPublisher;
