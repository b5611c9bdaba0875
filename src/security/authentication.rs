//! Bearer token authentication.
//!
//! # Responsibilities
//! - Validate JWT bearer tokens against the configured authority
//! - Attach a [`CallerIdentity`] to authenticated requests
//!
//! # Design Decisions
//! - Authentication never rejects a request by itself; the authorization
//!   filter decides (an anonymous request is fine under `AllowAll`)
//! - Signature key is `ApiSecret`, audience is `ApiName`, issuer is `Authority`
//! - `IsHttps` requires an `https://` authority; checked once at startup

use std::collections::BTreeSet;
use std::fmt;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use url::Url;

use crate::config::{Secret, ServiceConfigurationOptions};

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
    pub scopes: BTreeSet<String>,
}

impl CallerIdentity {
    pub fn new<I, S>(subject: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Marker left on a request whose bearer token was rejected.
#[derive(Debug, Clone)]
pub struct AuthenticationFailure {
    pub reason: String,
}

/// Authentication settings bound from `ServiceConfigurationOptions`.
#[derive(Clone)]
pub struct AuthenticationOptions {
    pub api_name: String,
    pub api_secret: Secret,
    pub authority: String,
    pub require_https_metadata: bool,
}

impl fmt::Debug for AuthenticationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationOptions")
            .field("api_name", &self.api_name)
            .field("api_secret", &self.api_secret)
            .field("authority", &self.authority)
            .field("require_https_metadata", &self.require_https_metadata)
            .finish()
    }
}

impl From<&ServiceConfigurationOptions> for AuthenticationOptions {
    fn from(options: &ServiceConfigurationOptions) -> Self {
        Self {
            api_name: options.api_name.clone(),
            api_secret: options.api_secret.clone(),
            authority: options.authority.clone(),
            require_https_metadata: options.is_https,
        }
    }
}

/// Errors while registering authentication handling.
#[derive(Debug, thiserror::Error)]
pub enum AuthSetupError {
    #[error("authority `{authority}` is not a valid URL: {source}")]
    InvalidAuthority {
        authority: String,
        source: url::ParseError,
    },

    #[error("authority `{authority}` must use https when IsHttps is enabled")]
    InsecureAuthority { authority: String },
}

/// Reasons a presented token is not accepted.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token validation failed: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token has no subject or client_id claim")]
    MissingSubject,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    List(Vec<String>),
    Delimited(String),
}

impl ScopeClaim {
    fn into_scopes(self) -> Vec<String> {
        match self {
            ScopeClaim::List(scopes) => scopes,
            ScopeClaim::Delimited(scopes) => scopes.split_whitespace().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    client_id: Option<String>,
    scope: Option<ScopeClaim>,
}

/// Validates bearer tokens issued by the configured authority.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
    authority: Url,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("authority", &self.authority.as_str())
            .field("audience", &self.validation.aud)
            .finish()
    }
}

impl TokenValidator {
    pub fn new(options: &AuthenticationOptions) -> Result<Self, AuthSetupError> {
        let authority = Url::parse(&options.authority).map_err(|source| {
            AuthSetupError::InvalidAuthority {
                authority: options.authority.clone(),
                source,
            }
        })?;

        if options.require_https_metadata && authority.scheme() != "https" {
            return Err(AuthSetupError::InsecureAuthority {
                authority: options.authority.clone(),
            });
        }

        let issuer = options.authority.trim_end_matches('/');
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[options.api_name.as_str()]);
        validation.set_issuer(&[issuer.to_string(), format!("{}/", issuer)]);
        validation.validate_nbf = true;

        Ok(Self {
            key: DecodingKey::from_secret(options.api_secret.expose().as_bytes()),
            validation,
            authority,
        })
    }

    pub fn authority(&self) -> &Url {
        &self.authority
    }

    /// Validate a raw token and extract the caller identity.
    pub fn validate(&self, token: &str) -> Result<CallerIdentity, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        let claims = data.claims;
        let subject = claims
            .sub
            .or(claims.client_id)
            .ok_or(TokenError::MissingSubject)?;
        let scopes = claims.scope.map(ScopeClaim::into_scopes).unwrap_or_default();
        Ok(CallerIdentity::new(subject, scopes))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token<B>(request: &Request<B>) -> Option<&str> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authentication middleware.
///
/// Valid token: `CallerIdentity` is inserted. Invalid token: an
/// `AuthenticationFailure` is inserted. Either way the request continues.
pub async fn authentication_middleware(
    State(validator): State<TokenValidator>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = bearer_token(&request).map(|token| validator.validate(token));

    match outcome {
        Some(Ok(identity)) => {
            tracing::debug!(subject = %identity.subject, scopes = ?identity.scopes, "Caller authenticated");
            request.extensions_mut().insert(identity);
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Bearer token rejected");
            request.extensions_mut().insert(AuthenticationFailure {
                reason: e.to_string(),
            });
        }
        None => {}
    }

    next.run(request).await
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    pub const SECRET: &str = "unit-test-secret";
    pub const AUDIENCE: &str = "orders";
    pub const ISSUER: &str = "https://issuer.example";

    pub fn token(claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    pub fn valid_claims(scope: serde_json::Value) -> serde_json::Value {
        let exp = chrono::Utc::now().timestamp() + 600;
        json!({
            "sub": "client-1",
            "aud": AUDIENCE,
            "iss": ISSUER,
            "exp": exp,
            "scope": scope,
        })
    }
}
