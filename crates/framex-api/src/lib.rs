//! Axum read API for the FrameX services.
//!
//! This crate provides:
//! - The queue status API served by the processing worker
//! - The video catalog API served by the storage service
//! - Prometheus recorder and HTTP request metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::Owner;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::{create_catalog_router, create_status_router};
pub use server::serve;
pub use state::{CatalogState, StatusState};
