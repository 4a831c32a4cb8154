//! Frame extraction worker binary.
//!
//! Consumes the intake queue and serves the queue status API.

use std::sync::Arc;

use tracing::{error, info, warn};

use framex_api::{create_status_router, ApiConfig, StatusState};
use framex_media::{check_ffmpeg, FfmpegFrameExtractor};
use framex_queue::{CacheConfig, ProjectorConfig, QueueConfig, QueueStatusProjector};
use framex_storage::S3Store;
use framex_worker::runtime::{connect_broker, init_metrics, install_crypto_provider, run_with_api};
use framex_worker::{
    init_tracing, shutdown_on_signal, ConsumerLoop, ExtractionPipeline, FrameProcessor, WorkerConfig,
    WorkerError, WorkerResult,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    install_crypto_provider();

    info!("Starting framex-worker");

    if let Err(e) = run().await {
        error!("Worker failed: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

async fn run() -> WorkerResult<()> {
    let config = WorkerConfig::from_env();
    let queue_config = QueueConfig::from_env()?;
    let api_config = ApiConfig::from_env_with_port(8082);
    info!("Worker config: {:?}", config);

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .map_err(|e| WorkerError::config_error(format!("cannot create work dir {}: {}", config.work_dir, e)))?;

    match check_ffmpeg() {
        Ok(path) => info!(ffmpeg = %path.display(), "FFmpeg found"),
        Err(e) => warn!(error = %e, "FFmpeg not found, every job will fail at extraction"),
    }

    let metrics_handle = init_metrics(&api_config);
    let broker = connect_broker(&queue_config).await?;
    let cache = framex_queue::connect_cache(&CacheConfig::from_env()).await;
    let projector = Arc::new(QueueStatusProjector::new(
        Arc::clone(&broker),
        cache,
        queue_config.intake_queue.clone(),
        ProjectorConfig::from_env(),
    ));

    let store = Arc::new(S3Store::from_env()?);
    let extractor = Arc::new(
        FfmpegFrameExtractor::new(config.frame_rate).with_timeout(config.extraction_timeout_secs),
    );
    let pipeline = ExtractionPipeline::new(store, extractor, config.processed_bucket.clone(), &config.work_dir);
    let processor = Arc::new(FrameProcessor::new(
        pipeline,
        Arc::clone(&broker),
        queue_config.results_queue.clone(),
        Arc::clone(&projector),
    ));

    let consumer = ConsumerLoop::new(
        Arc::clone(&broker),
        queue_config.intake_queue.clone(),
        config.consumer_name.clone(),
        processor,
    )
    .with_dead_letter_queue(queue_config.dead_letter_queue.clone())
    .with_error_backoff(config.error_backoff);

    let router = create_status_router(StatusState::new(api_config.clone(), broker, projector), metrics_handle);

    run_with_api(consumer, router, api_config, shutdown_on_signal(), config.shutdown_timeout).await
}
