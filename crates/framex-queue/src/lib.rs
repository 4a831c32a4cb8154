//! Durable queues and the queue status projection.
//!
//! This crate provides:
//! - The [`Broker`] abstraction with RabbitMQ, Redis Streams and in-memory back-ends
//! - The [`CacheStore`] abstraction with Redis and in-memory back-ends
//! - The [`QueueStatusProjector`] serving queue length and position estimates

pub mod amqp;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod status;
pub mod streams;

use std::sync::Arc;

use tracing::{info, warn};

pub use amqp::AmqpBroker;
pub use broker::{Broker, Delivery, DeliveryHandle, Subscription};
pub use cache::{CacheStore, MemoryCache, RedisCache};
pub use config::{BrokerBackend, CacheConfig, ProjectorConfig, QueueConfig};
pub use error::{QueueError, QueueResult};
pub use memory::{MemoryBroker, MemoryQueueStats};
pub use status::QueueStatusProjector;
pub use streams::StreamsBroker;

/// Connect to the configured broker and declare every pipeline queue.
pub async fn connect(config: &QueueConfig) -> QueueResult<Arc<dyn Broker>> {
    let broker: Arc<dyn Broker> = match config.backend {
        BrokerBackend::Amqp => Arc::new(AmqpBroker::connect(&config.amqp_url).await?),
        BrokerBackend::Redis => Arc::new(
            StreamsBroker::connect(
                &config.redis_url,
                config.stream_group.clone(),
                config.stream_block,
                config.stream_claim_idle,
            )
            .await?,
        ),
        BrokerBackend::Memory => Arc::new(MemoryBroker::new()),
    };

    for queue in config.all_queues() {
        broker.declare(queue).await?;
    }

    info!(provider = broker.provider_name(), "Queue broker ready");
    Ok(broker)
}

/// Connect to the projection cache, or run without one.
///
/// A cache that cannot be reached at start-up is logged and skipped; the
/// projector then always computes live.
pub async fn connect_cache(config: &CacheConfig) -> Option<Arc<dyn CacheStore>> {
    if !config.enabled {
        info!("Projection cache disabled");
        return None;
    }
    match RedisCache::connect(&config.redis_url).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(error = %e, "Projection cache unavailable, continuing without it");
            None
        }
    }
}
