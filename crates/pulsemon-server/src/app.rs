use crate::handlers::{v1, v2, v3};
use crate::middleware::{allowlist, decrypt, gzip, hash, logging};
use crate::state::AppState;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;

/// Builds the HTTP surface with the middleware chain applied
/// outermost-first: IP allowlist, decryption, request logging, gzip,
/// request hash verification, response hash signing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/update/{kind}/{name}/{value}", post(v1::update_metric))
        .route("/value/{kind}/{name}", get(v1::get_metric))
        .route("/", get(v1::render_index))
        .route("/update/", post(v2::update_metric))
        .route("/value/", post(v2::get_metric))
        .route("/updates/", post(v3::update_metrics))
        .route("/ping", get(v3::ping))
        // Layers added later wrap the ones added earlier, so this list reads
        // innermost-first.
        .layer(from_fn_with_state(state.clone(), hash::sign_response))
        .layer(from_fn_with_state(state.clone(), hash::verify_request))
        .layer(from_fn(gzip::gzip_layer))
        .layer(from_fn(logging::request_logging))
        .layer(from_fn_with_state(state.clone(), decrypt::decrypt_request))
        .layer(from_fn_with_state(state.clone(), allowlist::ip_allowlist))
        .with_state(state)
}
