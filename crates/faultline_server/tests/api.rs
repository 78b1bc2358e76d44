//! API-level tests driven through the router.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use faultline_chaos::HarnessSeed;
use faultline_engine::{CoordinatorConfig, RunCoordinator, StreamHub};
use faultline_mesh::ServiceMesh;
use faultline_server::{router, AppState};
use faultline_store::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let mesh = ServiceMesh::standard(&HarnessSeed::default());
    let coordinator = RunCoordinator::new(
        CoordinatorConfig::new(),
        Arc::new(MemoryStore::new()),
        Arc::new(StreamHub::default()),
        Arc::new(mesh.clone()),
    );
    router(AppState { coordinator, mesh })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("status").unwrap(), "ok");
    assert_eq!(body.get("service").unwrap(), "orchestrator");
}

#[tokio::test]
async fn create_run_rejects_invalid_config() {
    let app = app();
    let (status, body) = send(
        &app,
        post_json(
            "/runs",
            json!({"workflow": "chain", "iterations": 0, "concurrency": 1, "clientTimeoutMs": 2000}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body
        .get("error")
        .unwrap()
        .as_str()
        .unwrap()
        .contains("iterations"));
}

#[tokio::test]
async fn create_run_executes_to_completion() {
    let app = app();
    let (status, body) = send(
        &app,
        post_json(
            "/runs",
            json!({"workflow": "chain", "iterations": 1, "concurrency": 1, "clientTimeoutMs": 2000}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let run_id = body.get("runId").unwrap().as_str().unwrap().to_string();

    let mut detail = Value::Null;
    for _ in 0..500 {
        let (status, body) = send(&app, get(&format!("/runs/{}", run_id))).await;
        assert_eq!(status, StatusCode::OK);
        if body.get("run").unwrap().get("status").unwrap() == "completed" {
            detail = body;
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }

    let run = detail.get("run").unwrap();
    assert_eq!(run.get("totalCalls").unwrap(), 3);
    assert_eq!(run.get("successCalls").unwrap(), 3);

    let graph = detail.get("callGraph").unwrap().as_array().unwrap();
    assert_eq!(graph.len(), 1);
    assert_eq!(graph[0].get("children").unwrap().as_array().unwrap().len(), 2);

    let calls = detail.get("calls").unwrap().as_array().unwrap();
    assert_eq!(calls.len(), 3);
}

#[tokio::test]
async fn list_runs_is_paginated() {
    let app = app();
    let (status, body) = send(&app, get("/runs?page=1&pageSize=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("page").unwrap(), 1);
    assert_eq!(body.get("pageSize").unwrap(), 5);
    assert_eq!(body.get("total").unwrap(), 0);
    assert!(body.get("items").unwrap().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_run_is_404() {
    let app = app();
    let (status, _) = send(
        &app,
        get("/runs/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_run_id_is_400() {
    let app = app();
    let (status, _) = send(&app, get("/runs/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chaos_update_and_reset_round_trip() {
    let app = app();

    let (status, body) = send(&app, get("/services/beta/chaos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("mode").unwrap(), "normal");

    let (status, body) = send(
        &app,
        post_json(
            "/services/beta/chaos",
            json!({"mode": "forceStatus", "forceStatusCode": 503}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("mode").unwrap(), "forceStatus");
    assert_eq!(body.get("forceStatusCode").unwrap(), 503);
    assert!(body.get("updatedAt").is_some());

    let (status, body) = send(&app, post_json("/services/beta/chaos/reset", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("mode").unwrap(), "normal");
}

#[tokio::test]
async fn chaos_update_validates_ranges() {
    let app = app();
    let (status, _) = send(
        &app,
        post_json(
            "/services/beta/chaos",
            json!({"mode": "forceStatus", "forceStatusCode": 200}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json(
            "/services/beta/chaos",
            json!({"mode": "probabilisticError", "errorProbability": 2.0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chaos_unknown_service_is_404() {
    let app = app();
    let (status, _) = send(&app, get("/services/delta/chaos")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn services_listing_carries_health_and_chaos() {
    let app = app();
    let (status, body) = send(&app, get("/services")).await;
    assert_eq!(status, StatusCode::OK);
    let services = body.get("services").unwrap().as_array().unwrap();
    assert_eq!(services.len(), 3);
    for service in services {
        assert_eq!(service.get("health").unwrap().get("status").unwrap(), "ok");
        assert!(service.get("chaos").unwrap().get("mode").is_some());
    }
}

#[tokio::test]
async fn terminate_is_accepted() {
    let app = app();
    let (status, body) = send(
        &app,
        post_json("/services/beta/terminate", json!({"delayMs": 50})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body.get("accepted").unwrap(), true);
    assert_eq!(body.get("service").unwrap(), "beta");
    assert_eq!(body.get("signal").unwrap(), "SIGTERM");
    assert_eq!(body.get("delayMs").unwrap(), 50);
}

#[tokio::test]
async fn terminate_rejects_excessive_delay() {
    let app = app();
    let (status, _) = send(
        &app,
        post_json("/services/beta/terminate", json!({"delayMs": 60000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clear_runs_reports_counts() {
    let app = app();
    let (status, body) = send(&app, post_json("/runs/clear", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("ok").unwrap(), true);
    assert_eq!(body.get("deletedRuns").unwrap(), 0);
    assert_eq!(body.get("deletedCalls").unwrap(), 0);
}
