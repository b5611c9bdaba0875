//! Environment-selected authorization filter.
//!
//! `EnvironmentGate::select` is the only authorization decision point of the
//! startup sequence. It runs once; the chosen [`Filter`] is immutable and
//! shared by every request afterwards.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::http::response::{error_response, error_response_with_details};
use crate::observability::metrics;
use crate::security::authentication::{AuthenticationFailure, CallerIdentity};
use crate::security::policy::AuthorizationPolicy;

/// Authorization strategy applied to the request router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Caller must be authenticated and hold every scope of the policy.
    Enforce(AuthorizationPolicy),
    /// Every request passes, identity or not.
    AllowAll,
}

/// Outcome of evaluating a filter for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No authenticated caller.
    Challenge,
    /// Authenticated, but scopes are missing.
    Forbid { missing: Vec<String> },
}

impl Decision {
    fn outcome(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Challenge => "challenge",
            Decision::Forbid { .. } => "forbid",
        }
    }
}

impl Filter {
    /// Stateless; safe to call concurrently.
    pub fn evaluate(&self, identity: Option<&CallerIdentity>) -> Decision {
        match self {
            Filter::AllowAll => Decision::Allow,
            Filter::Enforce(policy) => match identity {
                None => Decision::Challenge,
                Some(identity) => {
                    let missing = policy.missing_scopes(identity);
                    if missing.is_empty() {
                        Decision::Allow
                    } else {
                        Decision::Forbid {
                            missing: missing.into_iter().map(str::to_string).collect(),
                        }
                    }
                }
            },
        }
    }

    pub fn is_enforced(&self) -> bool {
        matches!(self, Filter::Enforce(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::Enforce(_) => "enforce",
            Filter::AllowAll => "allow_all",
        }
    }
}

/// Chooses between enforced and bypassed authorization.
pub struct EnvironmentGate;

impl EnvironmentGate {
    pub fn select(is_enforced: bool, policy: AuthorizationPolicy) -> Filter {
        if is_enforced {
            Filter::Enforce(policy)
        } else {
            Filter::AllowAll
        }
    }
}

/// Applies the selected filter to every request reaching the router.
pub async fn authorization_middleware(
    State(filter): State<Arc<Filter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = filter.evaluate(request.extensions().get::<CallerIdentity>());
    metrics::record_authorization(decision.outcome());

    match decision {
        Decision::Allow => next.run(request).await,
        Decision::Challenge => {
            let token_rejected = request.extensions().get::<AuthenticationFailure>().is_some();
            tracing::debug!(path = %request.uri().path(), token_rejected, "Request not authenticated");
            challenge_response(token_rejected)
        }
        Decision::Forbid { missing } => {
            tracing::debug!(path = %request.uri().path(), missing = ?missing, "Caller lacks required scopes");
            error_response_with_details(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "caller lacks required scopes",
                Some(json!({ "missing_scopes": missing })),
            )
        }
    }
}

fn challenge_response(token_rejected: bool) -> Response {
    let mut response = error_response(
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        if token_rejected {
            "bearer token is invalid"
        } else {
            "authentication required"
        },
    );
    let challenge = if token_rejected {
        HeaderValue::from_static("Bearer error=\"invalid_token\"")
    } else {
        HeaderValue::from_static("Bearer")
    };
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, challenge);
    response
}
