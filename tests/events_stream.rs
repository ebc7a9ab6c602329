mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures::StreamExt;
use school_cms_server::events::ServerEvent;
use school_cms_server::{api::app_router, build_state};
use serde_json::json;
use tempfile::tempdir;
use tower::ServiceExt;

#[tokio::test]
async fn live_stream_handshakes_then_forwards_events() {
    let tmp = tempdir().unwrap();
    let config = common::test_config(tmp.path());
    let state = build_state(&config).await.unwrap();
    let app = app_router(state.clone(), &config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/events/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let mut body = response.into_body().into_data_stream();

    // Handshake comment frame arrives before any event.
    let first = body.next().await.unwrap().unwrap();
    assert!(String::from_utf8(first.to_vec())
        .unwrap()
        .contains("connected"));

    // A publish while the session is open lands as exactly one frame.
    state.event_bus.publish(ServerEvent::new(
        "student-added",
        json!({"id": 1, "name": "Ada"}),
    ));
    let frame = body.next().await.unwrap().unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: student-added"));
    assert!(text.contains(r#""eventType":"student-added""#));
    assert!(text.contains("Ada"));
}

#[tokio::test]
async fn manual_trigger_reaches_an_open_session() {
    let tmp = tempdir().unwrap();
    let config = common::test_config(tmp.path());
    let state = build_state(&config).await.unwrap();
    let app = app_router(state, &config);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/events/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let mut body = response.into_body().into_data_stream();
    let _handshake = body.next().await.unwrap().unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/events/trigger")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"type": "grade-updated", "payload": {"studentId": 3}}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let frame = body.next().await.unwrap().unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: grade-updated"));
    assert!(text.contains(r#""studentId":3"#));
}
