//! Process start-up shared by the FrameX binaries.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use framex_api::metrics::{self, PrometheusHandle};
use framex_api::ApiConfig;
use framex_queue::{Broker, QueueConfig};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::consumer::{wait_for_shutdown, ConsumerLoop};
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{with_retries, RetryPolicy};

/// Install the rustls crypto provider used by the S3, Redis and SMTP clients.
pub fn install_crypto_provider() {
    // Err means another provider is already installed
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }
}

/// Connect to the broker, retrying while it comes up.
pub async fn connect_broker(config: &QueueConfig) -> WorkerResult<Arc<dyn Broker>> {
    let broker = with_retries(&RetryPolicy::startup("broker connect"), || framex_queue::connect(config)).await?;
    Ok(broker)
}

/// Install the Prometheus recorder when metrics are enabled.
pub fn init_metrics(config: &ApiConfig) -> Option<PrometheusHandle> {
    if !config.metrics_enabled {
        return None;
    }
    match metrics::init_metrics() {
        Ok(handle) => {
            info!("Prometheus metrics enabled at /metrics");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
            None
        }
    }
}

/// Run a consumer loop next to its read API until shutdown.
///
/// A consumer that stops without a shutdown request (broker connection lost)
/// is an error so the process exits and gets restarted.
pub async fn run_with_api(
    consumer: ConsumerLoop,
    router: Router,
    api_config: ApiConfig,
    shutdown: watch::Receiver<bool>,
    shutdown_timeout: Duration,
) -> WorkerResult<()> {
    let api = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = framex_api::serve(router, &api_config, wait_for_shutdown(shutdown)).await {
                error!(error = %e, "API server failed");
            }
        }
    });

    consumer.run(shutdown.clone()).await?;

    if !*shutdown.borrow() {
        api.abort();
        return Err(WorkerError::queue_failed(format!(
            "consumer of '{}' stopped unexpectedly",
            consumer.queue()
        )));
    }

    if tokio::time::timeout(shutdown_timeout, api).await.is_err() {
        warn!("API server did not stop within {:?}", shutdown_timeout);
    }
    Ok(())
}
