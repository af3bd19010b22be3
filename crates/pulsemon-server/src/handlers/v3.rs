//! Batch ingest and the database liveness probe.

use crate::handlers::storage_error_response;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pulsemon_common::model::Metric;

/// `POST /updates/` — applies a batch of metrics in one storage call.
pub async fn update_metrics(State(state): State<AppState>, body: Bytes) -> Response {
    let metrics: Vec<Metric> = match serde_json::from_slice(&body) {
        Ok(metrics) => metrics,
        Err(err) => {
            tracing::error!(error = %err, "failed to decode metrics batch");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if let Err(err) = state.storage.update_batch(&metrics).await {
        return storage_error_response("update batch", err);
    }
    StatusCode::OK.into_response()
}

/// `GET /ping` — succeeds only when the database backend answers.
pub async fn ping(State(state): State<AppState>) -> Response {
    match state.storage.ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            tracing::error!(error = %err, "database ping failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
