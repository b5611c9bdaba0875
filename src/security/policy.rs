//! Scope-based authorization policy.
//!
//! A policy always requires an authenticated caller. On top of that, every
//! configured scope must be granted by the caller's token. Scopes are
//! compared literally: no case folding, trimming or deduplication, because
//! scope validity is defined by the token issuer.

use crate::security::authentication::CallerIdentity;

/// Immutable set of scope requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    required_scopes: Vec<String>,
}

impl AuthorizationPolicy {
    /// Scopes as configured, in configuration order, duplicates included.
    pub fn required_scopes(&self) -> &[String] {
        &self.required_scopes
    }

    /// Required scopes the caller does not hold, in configuration order.
    pub fn missing_scopes<'a>(&'a self, identity: &CallerIdentity) -> Vec<&'a str> {
        let mut missing: Vec<&str> = Vec::new();
        for scope in &self.required_scopes {
            if !identity.has_scope(scope) && !missing.contains(&scope.as_str()) {
                missing.push(scope);
            }
        }
        missing
    }

    pub fn is_satisfied_by(&self, identity: &CallerIdentity) -> bool {
        self.required_scopes.iter().all(|s| identity.has_scope(s))
    }
}

/// Turns configured scope strings into an [`AuthorizationPolicy`].
pub struct ScopePolicyBuilder;

impl ScopePolicyBuilder {
    /// Build a policy. Infallible and free of side effects.
    pub fn build<I, S>(required_scopes: I) -> AuthorizationPolicy
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AuthorizationPolicy {
            required_scopes: required_scopes.into_iter().map(Into::into).collect(),
        }
    }
}
