use axum::{
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tags every request with an `x-request-id` (kept if the client sent one),
/// logs entry and exit with latency, and echoes the id on the response.
pub async fn request_logger_middleware<B>(mut req: Request<B>, next: Next<B>) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let header_value = HeaderValue::from_str(&request_id)
        .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
    req.headers_mut().insert(REQUEST_ID_HEADER, header_value.clone());

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let mut response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        latency_ms = start.elapsed().as_millis(),
        "Outgoing response"
    );

    response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    response
}
