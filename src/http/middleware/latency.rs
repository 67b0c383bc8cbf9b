//! Request latency instrumentation.

use std::time::Instant;

use axum::{extract::Request, extract::State, middleware::Next, response::Response};

use crate::http::server::AppState;

/// Record the wall time of every request in the latency histogram.
pub async fn observe_latency(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    state.request_latency.record(started.elapsed().as_secs_f64());
    response
}
