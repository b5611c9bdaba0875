//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! appsettings.toml
//!     + appsettings.{environment}.toml
//!     + environment variables (Section__Key)
//!     → loader.rs (merge layers, bind sections)
//!     → validation.rs (semantic checks)
//!     → typed sections (immutable, owned by the startup sequence)
//! ```
//!
//! # Design Decisions
//! - Config is loaded once per process start; there is no reload
//! - Optional sections fall back to defaults, required ones fail startup
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, ConfigurationSource};
pub use schema::{
    DocumentationConfig, HostConfig, LogFormat, LoggingConfig, Secret,
    ServiceConfigurationOptions, TelemetrySettings,
};
pub use validation::ValidationError;
