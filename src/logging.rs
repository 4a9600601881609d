use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Middleware that logs HTTP requests.
///
/// Server errors get a WARN line; liveness probes stay at DEBUG to keep
/// the log readable under health-check polling.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    if response.status().is_server_error() {
        tracing::warn!(%method, %path, status, duration_ms, "HTTP request failed");
    } else if path == "/health" {
        tracing::debug!(%method, %path, status, duration_ms, "HTTP request");
    } else {
        tracing::info!(%method, %path, status, duration_ms, "HTTP request");
    }

    response
}
