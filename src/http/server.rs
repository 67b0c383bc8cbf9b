//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create the Axum router: metrics, liveness, decode fallback
//! - Wire decode middleware (latency → logging context → handler)
//! - Bind the listener and run the accept loop as its own task
//! - Report the serve loop's terminal result exactly once

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::any,
    Router,
};
use metrics::Histogram;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::config::schema::DecodeConfig;
use crate::decoder::TokenDecoder;
use crate::http::decode::decode_token;
use crate::http::middleware::{inject_logging_context, observe_latency};
use crate::lifecycle::shutdown::{ListenerHandle, Shutdown};
use crate::observability::metrics::MetricsRegistry;

/// Receives the serve loop's terminal result, `Ok(())` after a graceful close.
pub type ServeCompletion = oneshot::Receiver<Result<(), std::io::Error>>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub decoder: Arc<dyn TokenDecoder>,
    pub decode: Arc<DecodeConfig>,
    pub metrics: Arc<MetricsRegistry>,
    pub request_latency: Histogram,
    pub logger: Dispatch,
}

/// Failed to bind the listener.
#[derive(Debug, Error)]
#[error("failed to bind port {port}: {source}")]
pub struct BindError {
    pub port: u16,
    #[source]
    pub source: std::io::Error,
}

/// HTTP server for the decode sidecar.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Bind `0.0.0.0:{port}`, register routes and spawn the accept loop.
    ///
    /// Returns once the listener is bound. Only [`ListenerHandle::close`]
    /// stops it; dropping the handle leaves the server running.
    pub async fn start(self, port: u16) -> Result<(ServeCompletion, ListenerHandle), BindError> {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))
            .await
            .map_err(|source| BindError { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BindError { port, source })?;

        let shutdown = Shutdown::new();
        let mut closed = shutdown.subscribe();
        let (done_tx, done_rx) = oneshot::channel();

        let logger = self.state.logger.clone();
        let router = build_router(self.state);
        tokio::spawn(
            async move {
                let result = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        if let Err(RecvError::Closed) = closed.recv().await {
                            std::future::pending::<()>().await;
                        }
                    })
                    .await;

                match &result {
                    Ok(()) => tracing::info!("HTTP server stopped"),
                    Err(e) => tracing::error!(error = %e, "HTTP server failed"),
                }
                let _ = done_tx.send(result);
            }
            .with_subscriber(logger),
        );

        tracing::info!(address = %local_addr, "server running");
        Ok((done_rx, ListenerHandle::new(local_addr, shutdown)))
    }
}

/// Build the router with all routes and middleware layers.
pub fn build_router(state: AppState) -> Router {
    let decode_routes = Router::new()
        .fallback(decode_token)
        .layer(middleware::from_fn_with_state(state.clone(), inject_logging_context))
        .layer(middleware::from_fn_with_state(state.clone(), observe_latency))
        .with_state(state.clone());

    Router::new()
        .route("/metrics", any(render_metrics))
        .route("/ping", any(ping))
        .with_state(state)
        .fallback_service(decode_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn ping() -> StatusCode {
    StatusCode::OK
}
