use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use pulsemon_common::envelope;

fn header_mentions_gzip(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}

/// Decompresses gzip request bodies and compresses responses for clients
/// that accept gzip.
pub async fn gzip_layer(request: Request, next: Next) -> Response {
    let accepts_gzip = header_mentions_gzip(request.headers().get(header::ACCEPT_ENCODING));
    let received_gzip = header_mentions_gzip(request.headers().get(header::CONTENT_ENCODING));

    let request = if received_gzip {
        let (mut parts, body) = request.into_parts();
        let Ok(compressed) = axum::body::to_bytes(body, usize::MAX).await else {
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read request body")
                .into_response();
        };
        let decompressed = match envelope::decompress(&compressed) {
            Ok(data) => data,
            Err(err) => {
                tracing::error!(error = %err, "failed to decompress request body");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to decompress request body",
                )
                    .into_response();
            }
        };
        parts.headers.remove(header::CONTENT_ENCODING);
        parts.headers.remove(header::CONTENT_LENGTH);
        Request::from_parts(parts, Body::from(decompressed))
    } else {
        request
    };

    let response = next.run(request).await;

    if !accepts_gzip {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to read response body")
            .into_response();
    };
    match envelope::compress(&bytes) {
        Ok(compressed) => {
            parts
                .headers
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(compressed))
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to compress response body");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to compress response body",
            )
                .into_response()
        }
    }
}
