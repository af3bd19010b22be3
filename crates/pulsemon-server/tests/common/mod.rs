#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use pulsemon_server::app;
use pulsemon_server::state::{AppState, Security};
use pulsemon_storage::memory::MemoryStorage;
use std::sync::Arc;
use tower::util::ServiceExt;

pub struct TestContext {
    pub storage: Arc<MemoryStorage>,
    pub state: AppState,
    pub app: Router,
}

pub fn build_test_context() -> TestContext {
    build_test_context_with_security(Security::disabled())
}

pub fn build_test_context_with_security(security: Security) -> TestContext {
    let storage = Arc::new(MemoryStorage::new());
    let state = AppState {
        storage: storage.clone(),
        security: Arc::new(security),
    };
    let app = app::build_router(state.clone());
    TestContext {
        storage,
        state,
        app,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, HeaderMap) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), headers)
}

pub async fn request_no_body(
    app: &Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Vec<u8>, HeaderMap) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, Vec<u8>, HeaderMap) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub fn body_text(body: &[u8]) -> String {
    String::from_utf8(body.to_vec()).unwrap()
}
