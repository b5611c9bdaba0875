//! API documentation subsystem.
//!
//! # Data Flow
//! ```text
//! artifact path
//!     → absent:  exception event, SkippedMissingArtifact, startup continues
//!     → present: artifact.rs (parse) → openapi.rs (generate) → Active
//! ```
//!
//! # Design Decisions
//! - Only a missing artifact degrades; an unreadable or malformed one is fatal
//! - The generated document is immutable and shared by the endpoints

pub mod artifact;
pub mod openapi;

use std::io;
use std::path::{Path, PathBuf};

use crate::observability::{TelemetryEvent, TelemetryPublisher};

pub use artifact::{default_artifact_path, DocumentationArtifact, OperationDoc};
pub use openapi::{DocumentationGenerator, SecuritySchemeDeclaration, ServiceInfo, BEARER_JWT};

/// Result of trying to activate API documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentationActivationState {
    Active,
    SkippedMissingArtifact,
    NotAttempted,
}

impl DocumentationActivationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::SkippedMissingArtifact => "skipped_missing_artifact",
            Self::NotAttempted => "not_attempted",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentationError {
    #[error("API documentation artifact has not been included in the deployment: {}", .path.display())]
    MissingArtifact { path: PathBuf },

    #[error("failed to read documentation artifact {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse documentation artifact {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("unsupported HTTP method `{method}` documented for `{path}`")]
    UnsupportedMethod { method: String, path: String },
}

/// Conditionally activates documentation generation.
pub struct DocumentationRegistrar {
    telemetry: TelemetryPublisher,
    security: SecuritySchemeDeclaration,
    service: ServiceInfo,
    generator: Option<DocumentationGenerator>,
}

impl DocumentationRegistrar {
    pub fn new(telemetry: TelemetryPublisher) -> Self {
        Self {
            telemetry,
            security: BEARER_JWT,
            service: ServiceInfo::current(),
            generator: None,
        }
    }

    /// Activate documentation from the artifact at `artifact_path`.
    ///
    /// A missing artifact is reported to telemetry and skipped; any other
    /// problem is returned to the caller.
    pub fn register(
        &mut self,
        artifact_path: &Path,
    ) -> Result<DocumentationActivationState, DocumentationError> {
        if !artifact_path.exists() {
            let missing = DocumentationError::MissingArtifact {
                path: artifact_path.to_path_buf(),
            };
            let event = TelemetryEvent::exception(&missing)
                .with_property("severity", "degradable")
                .with_property("artifact_path", artifact_path.display().to_string());
            self.telemetry.publish(event);
            tracing::warn!(path = %artifact_path.display(), "API documentation disabled: artifact missing");
            return Ok(DocumentationActivationState::SkippedMissingArtifact);
        }

        let artifact = DocumentationArtifact::read(artifact_path)?;
        let generator = DocumentationGenerator::new(&artifact, self.security, self.service)?;
        tracing::info!(
            path = %artifact_path.display(),
            operations = artifact.operations.len(),
            "API documentation activated"
        );
        self.generator = Some(generator);
        Ok(DocumentationActivationState::Active)
    }

    pub fn into_generator(self) -> Option<DocumentationGenerator> {
        self.generator
    }
}
