mod common;

use axum::http::StatusCode;
use common::{body_text, build_test_context, post_json, request_no_body};
use serde_json::Value;

#[tokio::test]
async fn gauge_update_then_lookup_returns_last_value() {
    let ctx = build_test_context();

    let (status, _, _) = request_no_body(&ctx.app, "POST", "/update/gauge/cpu/10").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/value/gauge/cpu").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_text(&body), "10");
}

#[tokio::test]
async fn counter_updates_accumulate() {
    let ctx = build_test_context();

    for _ in 0..2 {
        let (status, _, _) = request_no_body(&ctx.app, "POST", "/update/counter/hits/3").await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/value/counter/hits").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_text(&body), "6");
}

#[tokio::test]
async fn batch_update_applies_every_metric() {
    let ctx = build_test_context();

    let batch = r#"[{"id":"g","type":"gauge","value":1.5},{"id":"c","type":"counter","delta":2}]"#;
    let (status, _, _) = post_json(&ctx.app, "/updates/", batch).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/value/counter/c").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_text(&body), "2");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/value/gauge/g").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_text(&body), "1.5");
}

#[tokio::test]
async fn unknown_metric_kind_is_bad_request() {
    let ctx = build_test_context();
    let (status, _, _) = request_no_body(&ctx.app, "POST", "/update/wrong/x/1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_metric_name_is_not_found() {
    let ctx = build_test_context();
    let (status, _, _) = request_no_body(&ctx.app, "POST", "/update/gauge//1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unparseable_scalar_is_bad_request() {
    let ctx = build_test_context();
    let (status, _, _) = request_no_body(&ctx.app, "POST", "/update/counter/hits/1.5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = request_no_body(&ctx.app, "POST", "/update/gauge/cpu/hot").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lookup_of_missing_metric_is_not_found() {
    let ctx = build_test_context();
    let (status, _, _) = request_no_body(&ctx.app, "GET", "/value/gauge/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_counter_update_echoes_post_increment_total() {
    let ctx = build_test_context();

    let (status, _, _) =
        post_json(&ctx.app, "/update/", r#"{"id":"hits","type":"counter","delta":3}"#).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) =
        post_json(&ctx.app, "/update/", r#"{"id":"hits","type":"counter","delta":4}"#).await;
    assert_eq!(status, StatusCode::OK);
    let echoed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(echoed["delta"], 7);
}

#[tokio::test]
async fn json_gauge_update_echoes_value() {
    let ctx = build_test_context();

    let (status, body, _) =
        post_json(&ctx.app, "/update/", r#"{"id":"cpu","type":"gauge","value":"12.5"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let echoed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(echoed["value"], 12.5);
}

#[tokio::test]
async fn json_update_without_payload_is_bad_request() {
    let ctx = build_test_context();

    let (status, _, _) =
        post_json(&ctx.app, "/update/", r#"{"id":"hits","type":"counter"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = post_json(&ctx.app, "/update/", r#"{"id":"cpu","type":"gauge"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_lookup_round_trips() {
    let ctx = build_test_context();

    post_json(&ctx.app, "/update/", r#"{"id":"cpu","type":"gauge","value":0.75}"#).await;

    let (status, body, _) = post_json(&ctx.app, "/value/", r#"{"id":"cpu","type":"gauge"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let echoed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(echoed["value"], 0.75);

    let (status, _, _) = post_json(&ctx.app, "/value/", r#"{"id":"ghost","type":"counter"}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn index_page_renders_snapshot_as_html() {
    let ctx = build_test_context();

    request_no_body(&ctx.app, "POST", "/update/gauge/cpu/0.5").await;
    request_no_body(&ctx.app, "POST", "/update/counter/hits/9").await;

    let (status, body, headers) = request_no_body(&ctx.app, "GET", "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
    let html = body_text(&body);
    assert!(html.contains("cpu"));
    assert!(html.contains("hits"));
    assert!(html.contains("<table>"));
}

#[tokio::test]
async fn ping_fails_on_the_memory_backend() {
    let ctx = build_test_context();
    let (status, _, _) = request_no_body(&ctx.app, "GET", "/ping").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
