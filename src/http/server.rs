//! HTTP server hosting the assembled pipeline.
//!
//! # Responsibilities
//! - Serve the router on an already bound listener
//! - Stop accepting on the shutdown signal and drain in-flight requests
//! - Give up draining after the configured grace period
//!
//! The pipeline itself is built by `lifecycle::startup`; this type only
//! hosts it.

use std::future::IntoFuture;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::HostConfig;
use crate::lifecycle::Shutdown;

/// HTTP server for the assembled pipeline.
pub struct HttpServer {
    router: Router,
    config: HostConfig,
}

impl HttpServer {
    pub fn new(router: Router, config: HostConfig) -> Self {
        Self { router, config }
    }

    /// Run the server until `shutdown` fires and in-flight requests finish.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop = shutdown.subscribe();
        let mut deadline = shutdown.subscribe();
        let grace = Duration::from_secs(self.config.shutdown_grace_secs);

        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Shutdown signal received, draining requests");
            })
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => result?,
            _ = async {
                let _ = deadline.recv().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(grace_secs = grace.as_secs(), "Grace period elapsed with requests in flight");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
