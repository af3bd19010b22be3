//! Request handlers, grouped the way the API grew: `v1` is the path-encoded
//! surface plus the HTML index, `v2` the JSON single-metric surface, `v3`
//! batch ingest and the database liveness probe.

pub mod v1;
pub mod v2;
pub mod v3;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pulsemon_storage::StorageError;

/// Maps storage failures onto status codes: missing keys are 404, invalid
/// batch entries 400, everything else is logged and becomes a 500.
pub(crate) fn storage_error_response(context: &'static str, err: StorageError) -> Response {
    match err {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
        StorageError::MissingPayload { .. } => StatusCode::BAD_REQUEST.into_response(),
        err => {
            tracing::error!(context, error = %err, "storage operation failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
