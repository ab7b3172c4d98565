//! HTTP server for the Prometheus metrics endpoint.

use crate::metrics::MetricsRegistry;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Binds to localhost on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], port).into(),
        }
    }
}

/// HTTP server exposing `/metrics` and `/health`.
///
/// Prometheus collectors are internally synchronized, so the registry is
/// shared without a lock. A [`ProgressRecorder`](crate::metrics::ProgressRecorder)
/// updates it at every checkpoint while the server is scraping. The
/// server lives only as long as the process.
pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: Arc<MetricsRegistry>) -> Self {
        Self { config, registry }
    }

    fn router(registry: Arc<MetricsRegistry>) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(registry)
    }

    /// Serves until the process exits.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");

        axum::serve(listener, Self::router(self.registry))
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }

    /// Runs the server on its own thread with a private tokio runtime.
    ///
    /// The flip loop is synchronous; this keeps it off the async runtime.
    pub fn spawn(self) -> std::thread::JoinHandle<Result<(), ServerError>> {
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .map_err(|e| ServerError::Server(e.to_string()))?;
            runtime.block_on(self.run())
        })
    }
}

async fn metrics_handler(State(registry): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    match registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
