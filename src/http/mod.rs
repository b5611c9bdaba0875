//! HTTP surface of the service.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum::serve, graceful shutdown)
//!     → exceptions.rs (panic and 5xx → exception events)
//!     → request id, trace, timeout layers
//!     → /swagger (docs, when active) | /probe (probe.rs) | routes.rs (gated)
//!     → response.rs (JSON error envelope for every rejection)
//! ```

pub mod exceptions;
pub mod probe;
pub mod response;
pub mod routes;
pub mod server;

pub use exceptions::{server_error_events, PanicTranslator, UnhandledError};
pub use probe::{probe_router, PROBE_PATH};
pub use response::{error_response, ErrorBody, ErrorDetail};
pub use routes::service_routes;
pub use server::HttpServer;
