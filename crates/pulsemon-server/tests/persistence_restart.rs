mod common;

use axum::http::StatusCode;
use common::{body_text, request_no_body};
use pulsemon_server::app;
use pulsemon_server::state::{AppState, Security};
use pulsemon_storage::memory::MemoryStorage;
use std::sync::Arc;

fn state_for(storage: Arc<MemoryStorage>) -> AppState {
    AppState {
        storage,
        security: Arc::new(Security::disabled()),
    }
}

// Synchronous persistence then a simulated restart: the counter written
// before the "crash" must be served by the restored instance.
#[tokio::test]
async fn counter_survives_restart_with_sync_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics-db.json").to_string_lossy().into_owned();

    {
        let storage = Arc::new(MemoryStorage::new());
        MemoryStorage::configure_persistence(&storage, &path, false, 0).unwrap();
        let app = app::build_router(state_for(storage));

        let (status, _, _) = request_no_body(&app, "POST", "/update/counter/c/5").await;
        assert_eq!(status, StatusCode::OK);
    }

    let storage = Arc::new(MemoryStorage::new());
    storage.restore_from_file(&path).unwrap();
    let app = app::build_router(state_for(storage));

    let (status, body, _) = request_no_body(&app, "GET", "/value/counter/c").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_text(&body), "5");
}

// Periodic persistence: a snapshot taken after the last update must restore
// the exact in-memory state.
#[tokio::test]
async fn snapshot_restores_full_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics-db.json");

    let storage = Arc::new(MemoryStorage::new());
    let app = app::build_router(state_for(storage.clone()));
    request_no_body(&app, "POST", "/update/gauge/cpu/0.25").await;
    request_no_body(&app, "POST", "/update/counter/hits/11").await;
    storage.snapshot_to_file(&path).unwrap();

    let restored = Arc::new(MemoryStorage::new());
    restored.restore_from_file(&path).unwrap();
    let app = app::build_router(state_for(restored));

    let (_, body, _) = request_no_body(&app, "GET", "/value/gauge/cpu").await;
    assert_eq!(body_text(&body), "0.25");
    let (_, body, _) = request_no_body(&app, "GET", "/value/counter/hits").await;
    assert_eq!(body_text(&body), "11");
}
