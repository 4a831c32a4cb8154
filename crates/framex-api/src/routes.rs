//! API routes.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::timeout::TimeoutLayer;

use crate::config::ApiConfig;
use crate::handlers::{
    delete_video, download_url, get_stats, get_video, health, list_videos, queue_position,
    queue_status, ready_catalog, ready_status,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::{CatalogState, StatusState};

fn metrics_routes<S>(metrics_handle: Option<PrometheusHandle>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    }
}

fn with_common_layers(router: Router, config: &ApiConfig) -> Router {
    router
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&config.cors_origins))
}

/// Router of the processing service: health and queue status.
pub fn create_status_router(state: StatusState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready_status))
        .route("/queue/status", get(queue_status))
        .route("/queue/position/:video_id", get(queue_position))
        .merge(metrics_routes(metrics_handle))
        .with_state(state);

    with_common_layers(router, &config)
}

/// Router of the storage service: the caller's video catalog.
pub fn create_catalog_router(state: CatalogState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready_catalog))
        .route("/videos", get(list_videos))
        .route("/videos/:video_id", get(get_video).delete(delete_video))
        .route("/stats", get(get_stats))
        .route("/download/:video_id", get(download_url))
        .merge(metrics_routes(metrics_handle))
        .with_state(state);

    with_common_layers(router, &config)
}
