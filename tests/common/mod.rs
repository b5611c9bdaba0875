//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use api_bootstrap::config::ConfigurationSource;
use api_bootstrap::lifecycle::PipelineAssembler;
use api_bootstrap::observability::MemorySink;
use api_bootstrap::security::RuntimeEnvironmentContext;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";
pub const AUDIENCE: &str = "orders";
pub const ISSUER: &str = "https://issuer.example";

/// `appsettings.toml` content for the orders service.
///
/// `docs` is written as the `[Documentation]` section verbatim.
pub fn settings(scopes: &[&str], docs: &str) -> String {
    let scopes = scopes
        .iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"
[Telemetry]
InstrumentationKey = "ikey"
InternalKey = "internal"

[ServiceConfigurationOptions]
RequiredScopes = [{scopes}]
ApiName = "{AUDIENCE}"
ApiSecret = "{SECRET}"
Authority = "{ISSUER}"
IsHttps = true

[Documentation]
{docs}
"#
    )
}

pub fn write_settings(dir: &Path, content: &str) {
    std::fs::write(dir.join("appsettings.toml"), content).unwrap();
}

/// Assembler over `dir`, recording telemetry into the returned sink.
pub fn assembler(dir: &Path, in_fabric: bool) -> (PipelineAssembler, Arc<MemorySink>) {
    let config = ConfigurationSource::load_with_env(dir, "Test", Vec::new()).unwrap();
    let sink = Arc::new(MemorySink::new());
    let assembler = PipelineAssembler::new(config, RuntimeEnvironmentContext::fixed(in_fabric))
        .with_sinks(vec![sink.clone()]);
    (assembler, sink)
}

/// Signed token for the test authority carrying `scopes`.
pub fn token(scopes: &[&str]) -> String {
    let claims = json!({
        "sub": "client-1",
        "aud": AUDIENCE,
        "iss": ISSUER,
        "exp": chrono::Utc::now().timestamp() + 600,
        "scope": scopes.join(" "),
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Drive one request through the router.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}
