//! Exception-to-event translation.
//!
//! The outermost pipeline layer. A panicking handler becomes a 500 JSON
//! error and an exception event; a 5xx produced anywhere inside the pipeline
//! yields an exception event as well.

use std::any::Any;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_http::catch_panic::ResponseForPanic;

use crate::http::response::error_response;
use crate::observability::{TelemetryEvent, TelemetryPublisher};

/// Failure surfaced by the request pipeline rather than by a handler's own
/// error handling.
#[derive(Debug, thiserror::Error)]
pub enum UnhandledError {
    #[error("request handler panicked: {0}")]
    Panic(String),

    #[error("{method} {path} answered {status}")]
    ServerError {
        status: StatusCode,
        method: String,
        path: String,
    },
}

/// Turns a caught panic into a JSON 500 and publishes it.
#[derive(Debug, Clone)]
pub struct PanicTranslator {
    telemetry: TelemetryPublisher,
}

impl PanicTranslator {
    pub fn new(telemetry: TelemetryPublisher) -> Self {
        Self { telemetry }
    }
}

impl ResponseForPanic for PanicTranslator {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let error = UnhandledError::Panic(panic_message(err.as_ref()));
        tracing::error!(error = %error, "Request handler panicked");
        let event = TelemetryEvent::exception(&error).with_property("source", "panic");
        self.telemetry.publish(event);

        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "an unexpected error occurred",
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Publishes an exception event for every 5xx response.
pub async fn server_error_events(
    State(telemetry): State<TelemetryPublisher>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        let error = UnhandledError::ServerError {
            status,
            method,
            path,
        };
        let event = TelemetryEvent::exception(&error)
            .with_property("source", "response")
            .with_property("status", status.as_u16().to_string());
        telemetry.publish(event);
    }

    response
}
