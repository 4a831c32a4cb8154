//! Storage service binary.
//!
//! Consumes the results queue into the video catalog and serves the catalog API.

use std::sync::Arc;

use tracing::{error, info};

use framex_api::{create_catalog_router, ApiConfig, CatalogState};
use framex_notify::StaticDirectory;
use framex_queue::QueueConfig;
use framex_storage::{MemoryCatalog, S3Config, S3Store};
use framex_worker::runtime::{connect_broker, init_metrics, install_crypto_provider, run_with_api};
use framex_worker::{init_tracing, shutdown_on_signal, ConsumerLoop, ResultConsumer, WorkerConfig, WorkerResult};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    install_crypto_provider();

    info!("Starting framex-storage");

    if let Err(e) = run().await {
        error!("Storage service failed: {}", e);
        std::process::exit(1);
    }

    info!("Storage service shutdown complete");
}

async fn run() -> WorkerResult<()> {
    let config = WorkerConfig::from_env();
    let queue_config = QueueConfig::from_env()?;
    let s3_config = S3Config::from_env()?;
    let api_config = ApiConfig::from_env_with_port(8083);

    let metrics_handle = init_metrics(&api_config);
    let broker = connect_broker(&queue_config).await?;
    let catalog = Arc::new(MemoryCatalog::new());
    let store = Arc::new(S3Store::new(&s3_config));

    let consumer = ConsumerLoop::new(
        Arc::clone(&broker),
        queue_config.results_queue.clone(),
        config.consumer_name.clone(),
        Arc::new(ResultConsumer::new(
            catalog.clone(),
            Arc::new(StaticDirectory::from_env()),
            broker,
            queue_config.notifications_queue.clone(),
        )),
    )
    .with_dead_letter_queue(queue_config.dead_letter_queue.clone())
    .with_error_backoff(config.error_backoff);

    let state = CatalogState::new(
        api_config.clone(),
        catalog,
        store,
        s3_config.processed_bucket.clone(),
        s3_config.presign_expiry,
    );
    let router = create_catalog_router(state, metrics_handle);

    run_with_api(consumer, router, api_config, shutdown_on_signal(), config.shutdown_timeout).await
}
