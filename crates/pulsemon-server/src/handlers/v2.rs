//! JSON single-metric endpoints. The body is decoded by hand so malformed
//! JSON and missing payload fields map onto the documented status codes.

use crate::handlers::storage_error_response;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pulsemon_common::model::{Metric, MetricKind};

fn decode(body: &[u8]) -> Result<Metric, Response> {
    let metric: Metric = serde_json::from_slice(body).map_err(|err| {
        tracing::error!(error = %err, "failed to decode metric body");
        StatusCode::BAD_REQUEST.into_response()
    })?;
    if metric.id.trim().is_empty() {
        tracing::error!("empty metric name");
        return Err(StatusCode::NOT_FOUND.into_response());
    }
    Ok(metric)
}

/// `POST /update/` — updates one metric and echoes it back. For counters
/// the echoed `delta` is the post-increment total.
pub async fn update_metric(State(state): State<AppState>, body: Bytes) -> Response {
    let mut metric = match decode(&body) {
        Ok(metric) => metric,
        Err(response) => return response,
    };

    match metric.kind {
        MetricKind::Counter => {
            let Some(delta) = metric.delta else {
                tracing::error!(id = %metric.id, "counter update without delta");
                return StatusCode::BAD_REQUEST.into_response();
            };
            match state.storage.update_counter_and_return(&metric.id, delta).await {
                Ok(total) => metric.delta = Some(total),
                Err(err) => return storage_error_response("update counter", err),
            }
        }
        MetricKind::Gauge => {
            let Some(value) = metric.value else {
                tracing::error!(id = %metric.id, "gauge update without value");
                return StatusCode::BAD_REQUEST.into_response();
            };
            if let Err(err) = state.storage.update_gauge(&metric.id, value).await {
                return storage_error_response("update gauge", err);
            }
        }
    }

    Json(metric).into_response()
}

/// `POST /value/` — looks up the metric named in the body and echoes it
/// back with the stored payload filled in.
pub async fn get_metric(State(state): State<AppState>, body: Bytes) -> Response {
    let mut metric = match decode(&body) {
        Ok(metric) => metric,
        Err(response) => return response,
    };

    match metric.kind {
        MetricKind::Counter => match state.storage.counter(&metric.id).await {
            Ok(delta) => metric.delta = Some(delta),
            Err(err) => return storage_error_response("get counter", err),
        },
        MetricKind::Gauge => match state.storage.gauge(&metric.id).await {
            Ok(value) => metric.value = Some(value),
            Err(err) => return storage_error_response("get gauge", err),
        },
    }

    Json(metric).into_response()
}
