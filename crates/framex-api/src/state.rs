//! Application state.

use std::sync::Arc;
use std::time::Duration;

use framex_queue::{Broker, QueueStatusProjector};
use framex_storage::{Catalog, ObjectStore};

use crate::config::ApiConfig;

/// State of the processing service's status API.
#[derive(Clone)]
pub struct StatusState {
    pub config: ApiConfig,
    pub broker: Arc<dyn Broker>,
    pub projector: Arc<QueueStatusProjector>,
}

impl StatusState {
    pub fn new(config: ApiConfig, broker: Arc<dyn Broker>, projector: Arc<QueueStatusProjector>) -> Self {
        Self {
            config,
            broker,
            projector,
        }
    }
}

/// State of the storage service's catalog API.
#[derive(Clone)]
pub struct CatalogState {
    pub config: ApiConfig,
    pub catalog: Arc<dyn Catalog>,
    pub store: Arc<dyn ObjectStore>,
    /// Bucket holding the frame archives
    pub processed_bucket: String,
    /// Lifetime of presigned download URLs
    pub presign_expiry: Duration,
}

impl CatalogState {
    pub fn new(
        config: ApiConfig,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn ObjectStore>,
        processed_bucket: impl Into<String>,
        presign_expiry: Duration,
    ) -> Self {
        Self {
            config,
            catalog,
            store,
            processed_bucket: processed_bucket.into(),
            presign_expiry,
        }
    }
}
