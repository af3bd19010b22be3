use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use pulsemon_common::crypto;

/// Unwraps hybrid-encrypted request bodies: the `Encrypted-AES-Key` header
/// carries the RSA-wrapped AES key, the body is `nonce || ciphertext+tag`.
/// Pass-through when no private key is configured.
pub async fn decrypt_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(private_key) = &state.security.private_key else {
        return next.run(request).await;
    };

    let (mut parts, body) = request.into_parts();

    let Some(encrypted_key) = parts
        .headers
        .get("encrypted-aes-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    else {
        tracing::error!("Encrypted-AES-Key header is missing");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Encrypted-AES-Key header is missing",
        )
            .into_response();
    };

    let Ok(encrypted_body) = axum::body::to_bytes(body, usize::MAX).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read request body").into_response();
    };

    let plaintext = match crypto::open(&encrypted_body, &encrypted_key, private_key) {
        Ok(plaintext) => plaintext,
        Err(err) => {
            tracing::error!(error = %err, "failed to decrypt request body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to decrypt request body",
            )
                .into_response();
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    let request = Request::from_parts(parts, Body::from(plaintext));
    next.run(request).await
}
