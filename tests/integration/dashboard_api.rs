#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;

use affinity::dashboard::{build_router, DashboardState};
use affinity::data_generator::demo_ratings;
use affinity::{SqliteRatingsStore, StrategyEngine};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

fn router_for(path: &Path, title: &str) -> Router {
    let state = DashboardState::new(
        SqliteRatingsStore::new(path),
        StrategyEngine::default(),
        3,
        title,
    );
    build_router(Arc::new(state), &[])
}

fn seeded_router() -> (TempDir, Router) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("ratings.db");
    let store = SqliteRatingsStore::create(&path).expect("create store");
    store.replace_ratings(&demo_ratings()).expect("seed");
    let router = router_for(&path, "Insights");
    (dir, router)
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, body.to_vec())
}

async fn call_json(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let (status, body) = call(app, method, uri).await;
    let json = serde_json::from_slice(&body).expect("json body");
    (status, json)
}

#[tokio::test]
async fn health_tracks_training_state() {
    let (_dir, app) = seeded_router();
    let (status, json) = call_json(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["trained"], false);

    call_json(&app, Method::POST, "/api/train").await;
    let (_, json) = call_json(&app, Method::GET, "/health").await;
    assert_eq!(json["trained"], true);
}

#[tokio::test]
async fn train_then_list_items() {
    let (_dir, app) = seeded_router();
    let (_, items) = call_json(&app, Method::GET, "/api/items").await;
    assert_eq!(items["trained"], false);
    assert_eq!(items["items"], serde_json::json!([]));

    let (status, json) = call_json(&app, Method::POST, "/api/train").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["report"]["ratings"], 14);

    let (_, items) = call_json(&app, Method::GET, "/api/items").await;
    assert_eq!(items["items"], serde_json::json!([101, 102, 103, 104, 105]));
}

#[tokio::test]
async fn train_reports_failure_without_database() {
    let dir = TempDir::new().expect("tempdir");
    let app = router_for(&dir.path().join("missing.db"), "Insights");
    let (status, json) = call_json(&app, Method::POST, "/api/train").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().is_some());
    assert!(json.get("report").is_none());

    let (status, json) = call_json(&app, Method::GET, "/api/metrics").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["message"].as_str().is_some());
}

#[tokio::test]
async fn recommendations_before_training_are_empty() {
    let (_dir, app) = seeded_router();
    let (status, json) = call_json(&app, Method::GET, "/api/recommendations?item_id=101").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["trained"], false);
    assert_eq!(json["recommendations"], serde_json::json!([]));
}

#[tokio::test]
async fn recommendations_respect_top_n() {
    let (_dir, app) = seeded_router();
    call_json(&app, Method::POST, "/api/train").await;

    let (_, json) = call_json(&app, Method::GET, "/api/recommendations?item_id=101").await;
    let recs = json["recommendations"].as_array().expect("array");
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0]["item_id"], 102);

    let (_, json) =
        call_json(&app, Method::GET, "/api/recommendations?item_id=101&top_n=1").await;
    assert_eq!(json["recommendations"].as_array().map(Vec::len), Some(1));

    let (_, json) = call_json(&app, Method::GET, "/api/recommendations?item_id=999").await;
    assert_eq!(json["recommendations"], serde_json::json!([]));
}

#[tokio::test]
async fn missing_item_id_is_rejected() {
    let (_dir, app) = seeded_router();
    let (status, _) = call(&app, Method::GET, "/api/recommendations").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, Method::GET, "/api/strategy?item_id=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strategy_prescribes_actions() {
    let (_dir, app) = seeded_router();
    call_json(&app, Method::POST, "/api/train").await;
    let (status, json) = call_json(&app, Method::GET, "/api/strategy?item_id=101&top_n=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["threshold"], 0.5);
    let actions = json["actions"].as_array().expect("array");
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0]["recommendation"]["item_id"], 102);
    assert_eq!(actions[0]["action"]["priority"], "CRITICAL");
    assert_eq!(actions[1]["action"]["priority"], "MEDIUM");
}

#[tokio::test]
async fn metrics_list_every_item() {
    let (_dir, app) = seeded_router();
    let (status, json) = call_json(&app, Method::GET, "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().expect("array");
    assert_eq!(rows.len(), 5);
    let total: u64 = rows
        .iter()
        .map(|row| row["total_interactions"].as_u64().unwrap_or(0))
        .sum();
    assert_eq!(total, 14);
    assert_eq!(rows[0]["total_interactions"], 3);
    assert_eq!(rows[0]["item_id"], 101);
}

#[tokio::test]
async fn index_page_escapes_title() {
    let dir = TempDir::new().expect("tempdir");
    let app = router_for(&dir.path().join("ratings.db"), "Sales <Q3>");
    let (status, body) = call(&app, Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).expect("utf8");
    assert!(html.contains("<title>Sales &lt;Q3&gt;</title>"));
    assert!(html.contains("/api/recommendations"));
}
