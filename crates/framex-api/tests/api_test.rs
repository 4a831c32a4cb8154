//! HTTP tests for the status and catalog routers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use framex_api::{create_catalog_router, create_status_router, ApiConfig, CatalogState, StatusState};
use framex_models::{JobStatus, VideoId, VideoRecord};
use framex_queue::{Broker, MemoryBroker, ProjectorConfig, QueueStatusProjector};
use framex_storage::{Catalog, MemoryCatalog, MemoryStore};
use serde_json::Value;
use tower::ServiceExt;

const INTAKE: &str = "video_processing";
const PROCESSED: &str = "video-processed";

async fn status_app(depth: usize) -> (MemoryBroker, Router) {
    let broker = MemoryBroker::new();
    broker.declare(INTAKE).await.unwrap();
    for i in 0..depth {
        broker.publish(INTAKE, format!("job-{}", i).as_bytes()).await.unwrap();
    }

    let dyn_broker: Arc<dyn Broker> = Arc::new(broker.clone());
    let projector = QueueStatusProjector::new(dyn_broker.clone(), None, INTAKE, ProjectorConfig::default());
    let state = StatusState::new(ApiConfig::default(), dyn_broker, Arc::new(projector));
    (broker, create_status_router(state, None))
}

fn record(id: &str, owner: &str, status: JobStatus, minute: u32) -> VideoRecord {
    let completed = status == JobStatus::Completed;
    VideoRecord {
        video_id: VideoId::from(id),
        title: format!("{}.mp4", id),
        status,
        processed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        frame_count: if completed { 5 } else { 0 },
        zip_size: if completed { 1024 } else { 0 },
        zip_object_name: if completed {
            VideoId::from(id).archive_object_name()
        } else {
            String::new()
        },
        user_id: owner.to_string(),
        error: (!completed).then(|| "download failed: NoSuchKey".to_string()),
    }
}

async fn catalog_app() -> (Arc<MemoryCatalog>, Arc<MemoryStore>, Router) {
    let catalog = Arc::new(MemoryCatalog::new());
    let store = Arc::new(MemoryStore::new());

    catalog.put(record("v1", "ana", JobStatus::Completed, 1)).await;
    catalog.put(record("v2", "ana", JobStatus::Error, 2)).await;
    catalog.put(record("v3", "bob", JobStatus::Completed, 3)).await;
    store.insert(PROCESSED, "frames_v1.zip", b"PK".to_vec()).await;
    store.insert(PROCESSED, "frames_v3.zip", b"PK".to_vec()).await;

    let state = CatalogState::new(
        ApiConfig::default(),
        catalog.clone(),
        store.clone(),
        PROCESSED,
        Duration::from_secs(600),
    );
    (catalog, store, create_catalog_router(state, None))
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (_, app) = status_app(0).await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_queue_status_reports_depth() {
    let (_, app) = status_app(7).await;
    let (status, body) = send(&app, "GET", "/queue/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queue_length"], 7);
    assert_eq!(body["processing_count"], 5);
}

#[tokio::test]
async fn test_queue_position() {
    let (_, app) = status_app(7).await;
    let (status, body) = send(&app, "GET", "/queue/position/v42", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"], 3);
    assert_eq!(body["estimated_wait_seconds"], 270);

    let (_, empty) = status_app(0).await;
    let (_, body) = send(&empty, "GET", "/queue/position/v42", None).await;
    assert_eq!(body["position"], 1);
    assert_eq!(body["estimated_wait_seconds"], 90);
}

#[tokio::test]
async fn test_ready_degrades_when_broker_closes() {
    let (broker, app) = status_app(0).await;
    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    broker.close();
    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_list_requires_user_header() {
    let (_, _, app) = catalog_app().await;
    let (status, body) = send(&app, "GET", "/videos", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].as_str().unwrap().contains("x-user-id"));
}

#[tokio::test]
async fn test_list_is_scoped_to_owner() {
    let (_, _, app) = catalog_app().await;
    let (status, body) = send(&app, "GET", "/videos", Some("ana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    let ids: Vec<&str> = body["videos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["video_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["v2", "v1"]);
}

#[tokio::test]
async fn test_get_video_of_other_user_is_not_found() {
    let (_, _, app) = catalog_app().await;
    let (status, body) = send(&app, "GET", "/videos/v1", Some("ana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["zip_object_name"], "frames_v1.zip");

    let (status, _) = send(&app, "GET", "/videos/v3", Some("ana")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_checks_owner_and_removes_archive() {
    let (catalog, store, app) = catalog_app().await;

    let (status, _) = send(&app, "DELETE", "/videos/v3", Some("ana")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(catalog.get(&VideoId::from("v3")).await.is_some());

    let (status, _) = send(&app, "DELETE", "/videos/missing", Some("ana")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "DELETE", "/videos/v1", Some("ana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["video_id"], "v1");
    assert!(catalog.get(&VideoId::from("v1")).await.is_none());
    assert!(store.get(PROCESSED, "frames_v1.zip").await.is_none());
}

#[tokio::test]
async fn test_stats() {
    let (_, _, app) = catalog_app().await;
    let (status, body) = send(&app, "GET", "/stats", Some("ana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_videos"], 2);
    assert_eq!(body["completed"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["total_size"], 1024);
    assert_eq!(body["total_frames"], 5);
}

#[tokio::test]
async fn test_download_only_for_completed_videos() {
    let (_, _, app) = catalog_app().await;

    let (status, body) = send(&app, "GET", "/download/v1", Some("ana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "frames_v1.zip");
    assert_eq!(body["expires_in"], 600);
    assert!(body["url"].as_str().unwrap().contains("frames_v1.zip"));

    let (status, _) = send(&app, "GET", "/download/v2", Some("ana")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/download/v3", Some("ana")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
