//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Distinguish a missing required field from a malformed value
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the bound section
//! - Scope strings are never validated; the token issuer defines them

use std::net::SocketAddr;

use crate::config::schema::{HostConfig, ServiceConfigurationOptions, HOST_SECTION, SERVICE_SECTION};

/// A single semantic problem found in a configuration section.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{section}.{field} is required")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },

    #[error("{section}.{field} is invalid: {reason}")]
    InvalidValue {
        section: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Check the authentication options bound from `ServiceConfigurationOptions`.
pub fn validate_service_options(
    options: &ServiceConfigurationOptions,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if options.api_name.trim().is_empty() {
        errors.push(missing(SERVICE_SECTION, "ApiName"));
    }
    if options.api_secret.is_empty() {
        errors.push(missing(SERVICE_SECTION, "ApiSecret"));
    }
    if options.authority.trim().is_empty() {
        errors.push(missing(SERVICE_SECTION, "Authority"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check listener settings.
pub fn validate_host(host: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = host.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::InvalidValue {
            section: HOST_SECTION,
            field: "BindAddress",
            reason: e.to_string(),
        });
    }
    if host.request_timeout_secs == 0 {
        errors.push(ValidationError::InvalidValue {
            section: HOST_SECTION,
            field: "RequestTimeoutSecs",
            reason: "must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn missing(section: &'static str, field: &'static str) -> ValidationError {
    ValidationError::MissingField { section, field }
}
