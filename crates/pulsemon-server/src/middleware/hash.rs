use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use pulsemon_common::hash;

static HASH_HEADER: HeaderName = HeaderName::from_static("hashsha256");

/// Verifies the `HashSHA256` tag of the request body against the shared
/// secret. Requests without the header pass through; a mismatch is a 400.
pub async fn verify_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(key) = &state.security.hash_key else {
        return next.run(request).await;
    };
    let Some(received) = request
        .headers()
        .get(&HASH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read request body")
            .into_response();
    };

    if !hash::verify(key, &bytes, &received) {
        tracing::error!(%received, "request hash mismatch");
        return (StatusCode::BAD_REQUEST, "hash mismatch").into_response();
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}

/// Signs the response body with the shared secret and attaches the tag as
/// the `HashSHA256` header.
pub async fn sign_response(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(key) = &state.security.hash_key else {
        return next.run(request).await;
    };

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read response body")
            .into_response();
    };

    if let Ok(tag) = HeaderValue::from_str(&hash::sign(key, &bytes)) {
        parts.headers.insert(HASH_HEADER.clone(), tag);
    }
    Response::from_parts(parts, Body::from(bytes))
}
