//! Configuration schema definitions.
//!
//! Each struct binds one top-level section of the layered configuration.
//! Field names keep the external PascalCase keys
//! (`ServiceConfigurationOptions.ApiName`, `Telemetry.InstrumentationKey`, ...).

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Section name for [`ServiceConfigurationOptions`].
pub const SERVICE_SECTION: &str = "ServiceConfigurationOptions";
/// Section name for [`TelemetrySettings`].
pub const TELEMETRY_SECTION: &str = "Telemetry";
/// Section name for [`HostConfig`].
pub const HOST_SECTION: &str = "Host";
/// Section name for [`LoggingConfig`].
pub const LOGGING_SECTION: &str = "Logging";
/// Section name for [`DocumentationConfig`].
pub const DOCUMENTATION_SECTION: &str = "Documentation";

/// Secret material read from configuration.
///
/// `Debug` and `Display` never print the value.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Keep the borrow short.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret([REDACTED])")
        }
    }
}

/// Authentication and authorization options of the service.
///
/// `RequiredScopes` is optional; the other fields are checked by
/// [`crate::config::validation::validate_service_options`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceConfigurationOptions {
    /// Scopes every caller token must carry. Order and duplicates are kept.
    #[serde(default)]
    pub required_scopes: Vec<String>,

    /// API resource name, checked against the token audience.
    #[serde(default)]
    pub api_name: String,

    /// Shared secret used to verify token signatures.
    #[serde(default)]
    pub api_secret: Secret,

    /// Token issuer URL.
    #[serde(default)]
    pub authority: String,

    /// Require the authority to be served over HTTPS.
    #[serde(default = "default_true")]
    pub is_https: bool,
}

/// Telemetry keys used to build the process-wide publisher.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TelemetrySettings {
    pub instrumentation_key: Secret,
    pub internal_key: Secret,
}

/// Listener and request handling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Time allowed for in-flight requests after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "api_bootstrap=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// API documentation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DocumentationConfig {
    pub enabled: bool,

    /// Explicit artifact location. Defaults to the file next to the executable.
    pub artifact_path: Option<PathBuf>,
}

impl Default for DocumentationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            artifact_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}
