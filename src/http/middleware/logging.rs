//! Logging context injection.
//!
//! Every request runs with the process logger as its default dispatch, inside
//! a span carrying the request ID, method and path. Handlers can fill in the
//! `user` field once the token is decoded.

use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use tracing::instrument::WithSubscriber;
use tracing::Instrument;

use crate::http::server::AppState;

pub const X_REQUEST_ID: &str = "x-request-id";

pub async fn inject_logging_context(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let logger = state.logger.clone();

    async move {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            user = tracing::field::Empty,
        );

        let response = next.run(request).instrument(span.clone()).await;
        span.in_scope(|| {
            tracing::debug!(status = response.status().as_u16(), "request handled");
        });
        response
    }
    .with_subscriber(logger)
    .await
}
