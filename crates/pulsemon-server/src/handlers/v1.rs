//! Path-encoded single-metric endpoints and the HTML index page.

use crate::handlers::storage_error_response;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use pulsemon_common::model::MetricKind;
use std::fmt::Write as _;

const TEXT_PLAIN: (header::HeaderName, &str) =
    (header::CONTENT_TYPE, "text/plain; charset=utf-8");

const INDEX_TEMPLATE: &str = include_str!("../templates/metrics.html");

/// `POST /update/{kind}/{name}/{value}`
pub async fn update_metric(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Response {
    let Ok(kind) = kind.parse::<MetricKind>() else {
        tracing::error!(%kind, "invalid metric kind");
        return StatusCode::BAD_REQUEST.into_response();
    };
    if name.trim().is_empty() {
        tracing::error!("empty metric name");
        return StatusCode::NOT_FOUND.into_response();
    }

    let result = match kind {
        MetricKind::Counter => match value.parse::<i64>() {
            Ok(delta) => state.storage.update_counter(&name, delta).await,
            Err(err) => {
                tracing::error!(%value, error = %err, "failed to parse counter delta");
                return StatusCode::BAD_REQUEST.into_response();
            }
        },
        MetricKind::Gauge => match value.parse::<f64>() {
            Ok(value) => state.storage.update_gauge(&name, value).await,
            Err(err) => {
                tracing::error!(%value, error = %err, "failed to parse gauge value");
                return StatusCode::BAD_REQUEST.into_response();
            }
        },
    };

    if let Err(err) = result {
        return storage_error_response("update metric", err);
    }
    (StatusCode::OK, [TEXT_PLAIN]).into_response()
}

/// `GET /value/{kind}/{name}`
pub async fn get_metric(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Response {
    let Ok(kind) = kind.parse::<MetricKind>() else {
        tracing::error!(%kind, "invalid metric kind");
        return StatusCode::BAD_REQUEST.into_response();
    };
    if name.trim().is_empty() {
        tracing::error!("empty metric name");
        return StatusCode::NOT_FOUND.into_response();
    }

    let body = match kind {
        MetricKind::Counter => match state.storage.counter(&name).await {
            Ok(delta) => delta.to_string(),
            Err(err) => return storage_error_response("get counter", err),
        },
        MetricKind::Gauge => match state.storage.gauge(&name).await {
            Ok(value) => value.to_string(),
            Err(err) => return storage_error_response("get gauge", err),
        },
    };

    (StatusCode::OK, [TEXT_PLAIN], body).into_response()
}

/// `GET /` — the full snapshot as an HTML table.
pub async fn render_index(State(state): State<AppState>) -> Response {
    let gauges = match state.storage.all_gauges().await {
        Ok(gauges) => gauges,
        Err(err) => return storage_error_response("list gauges", err),
    };
    let counters = match state.storage.all_counters().await {
        Ok(counters) => counters,
        Err(err) => return storage_error_response("list counters", err),
    };

    let mut gauges: Vec<_> = gauges.into_iter().collect();
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    let mut counters: Vec<_> = counters.into_iter().collect();
    counters.sort_by(|a, b| a.0.cmp(&b.0));

    let mut rows = String::new();
    for (name, value) in gauges {
        let _ = writeln!(
            rows,
            "    <tr><td>gauge</td><td>{}</td><td>{value}</td></tr>",
            escape_html(&name)
        );
    }
    for (name, delta) in counters {
        let _ = writeln!(
            rows,
            "    <tr><td>counter</td><td>{}</td><td>{delta}</td></tr>",
            escape_html(&name)
        );
    }

    let body = INDEX_TEMPLATE.replace("{{rows}}", &rows);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
