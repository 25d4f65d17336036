use axum::http::StatusCode;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{debug, error, warn};

/// Log every claim request with its latency; failures at warn/error level
pub async fn log_request_errors(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().clone();
    let started = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    let elapsed = started.elapsed();

    if status == StatusCode::SERVICE_UNAVAILABLE {
        // Upstream faucet outage, the caller may retry
        warn!(%method, %path, %status, ?elapsed, "Faucet service unavailable");
    } else if status.is_server_error() {
        error!(%method, %path, %status, ?elapsed, "Claim request failed");
    } else if status.is_client_error() {
        warn!(%method, %path, %status, ?elapsed, "Claim request refused");
    } else {
        debug!(%method, %path, %status, ?elapsed, "Claim request served");
    }

    response
}
