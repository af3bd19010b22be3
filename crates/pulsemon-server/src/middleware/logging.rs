use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

/// Logs one line per request: method, URI, status, bytes written, elapsed.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = parts.status.as_u16(),
        bytes = bytes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request handled"
    );

    Response::from_parts(parts, Body::from(bytes))
}
