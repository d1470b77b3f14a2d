//! Router level tests against the in-memory runtime.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use termbox_core::{
    config::{ImageCatalog, ImageSpec},
    runtime::{Fault, InMemoryRuntime, RuntimeCall},
};
use tower::ServiceExt;

use crate::{config::Config, route::create_router, state::AppState};

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn test_app() -> (Router, Arc<InMemoryRuntime>) {
    let runtime = Arc::new(InMemoryRuntime::new());
    let catalog = ImageCatalog::new(vec![
        ImageSpec::new("alpine", ["3.11", "3.10"]),
        ImageSpec::new("ubuntu", ["22.04"]),
    ])
    .unwrap();

    let state = AppState::new(
        Arc::new(Config::builder().build()),
        runtime.clone(),
        Arc::new(catalog),
    );

    (create_router(state), runtime)
}

async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_healthy() {
    let (app, _) = test_app();
    let (status, body) = send(app, Method::GET, "/health", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Service is healthy");
}

#[tokio::test]
async fn test_create_box_with_catalog_image() {
    let (app, runtime) = test_app();
    let (status, body) = send(app, Method::POST, "/boxes", r#"{"image":"ubuntu:22.04"}"#).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["image"], "ubuntu:22.04");

    let id = body["id"].as_str().unwrap();
    assert_eq!(body["exec_path"], format!("/boxes/{}/exec", id));
    assert_eq!(runtime.pod_ids(), vec![id.to_string()]);
}

#[tokio::test]
async fn test_create_box_without_body_uses_default_image() {
    let (app, _) = test_app();
    let (status, body) = send(app, Method::POST, "/boxes", "").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["image"], "alpine:3.11");
}

#[tokio::test]
async fn test_create_box_rejects_image_outside_catalog() {
    let (app, runtime) = test_app();
    let (status, body) = send(app, Method::POST, "/boxes", r#"{"image":"debian:12"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("debian:12"));
    assert!(runtime.pod_ids().is_empty());
}

#[tokio::test]
async fn test_create_box_rejects_malformed_body() {
    let (app, _) = test_app();
    let (status, _) = send(app, Method::POST, "/boxes", "{").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_box_runtime_failure_is_bad_gateway() {
    let (app, runtime) = test_app();
    runtime.inject_fault(Fault::CreatePod);

    let (status, body) = send(app, Method::POST, "/boxes", "").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_list_boxes_only_shows_boxes() {
    let (app, runtime) = test_app();
    runtime.insert_pod("b1", "termbox", Utc::now());
    runtime.insert_pod("x1", "something-else", Utc::now());

    let (status, body) = send(app, Method::GET, "/boxes", "").await;

    assert_eq!(status, StatusCode::OK);
    let boxes = body["boxes"].as_array().unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0]["id"], "b1");
    assert_eq!(boxes[0]["name"], "termbox");
    assert_eq!(boxes[0]["status"], "running");
}

#[tokio::test]
async fn test_list_boxes_runtime_failure_is_bad_gateway() {
    let (app, runtime) = test_app();
    runtime.inject_fault(Fault::List);

    let (status, _) = send(app, Method::GET, "/boxes", "").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_exec_without_upgrade_is_rejected() {
    let (app, runtime) = test_app();
    runtime.insert_pod("b1", "termbox", Utc::now());

    let (status, _) = send(app, Method::GET, "/boxes/b1/exec", "").await;

    assert!(status.is_client_error());
    assert_ne!(status, StatusCode::NOT_FOUND);
    assert!(runtime.calls().iter().all(|call| !matches!(call, RuntimeCall::Exec(_))));
}

#[tokio::test]
async fn test_exec_unknown_box_is_not_found() {
    let (app, runtime) = test_app();
    runtime.insert_pod("x1", "something-else", Utc::now());

    let (status, body) = send(app.clone(), Method::GET, "/boxes/missing/exec", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    // Pods that are not boxes cannot be attached to either.
    let (status, _) = send(app, Method::GET, "/boxes/x1/exec", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
