//! Liveness probe.

use axum::{routing::get, Router};

pub const PROBE_PATH: &str = "/probe";

/// `GET /probe`, answered without authentication.
pub fn probe_router() -> Router {
    Router::new().route(PROBE_PATH, get(probe))
}

async fn probe() -> &'static str {
    "Healthy"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_probe_reports_healthy() {
        let response = probe_router()
            .oneshot(Request::builder().uri(PROBE_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Healthy");
    }
}
