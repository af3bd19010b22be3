use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::IpAddr;

/// Rejects requests whose `X-Real-IP` is missing, unparseable, or outside
/// the trusted subnet. Pass-through when no subnet is configured.
pub async fn ip_allowlist(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(subnet) = &state.security.trusted_subnet else {
        return next.run(request).await;
    };

    let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
    else {
        tracing::error!("X-Real-IP header is missing");
        return (StatusCode::FORBIDDEN, "X-Real-IP header is missing").into_response();
    };

    let Ok(ip) = real_ip.parse::<IpAddr>() else {
        tracing::error!(real_ip, "invalid address in X-Real-IP header");
        return (StatusCode::FORBIDDEN, "invalid address in X-Real-IP header").into_response();
    };

    if !subnet.contains(&ip) {
        tracing::error!(ip = %ip, subnet = %subnet, "address is not in the trusted subnet");
        return (StatusCode::FORBIDDEN, "address is not in the trusted subnet").into_response();
    }

    next.run(request).await
}
