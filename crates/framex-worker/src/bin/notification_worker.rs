//! Notification service binary.
//!
//! Consumes the notifications queue and sends e-mails. With
//! `SEND_TEST_EMAIL=true` it sends one test e-mail to `TEST_EMAIL` and exits.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use framex_models::{NotificationKind, NotificationRequest, VideoId};
use framex_notify::{mailer, SmtpConfig};
use framex_queue::QueueConfig;
use framex_worker::runtime::{connect_broker, install_crypto_provider};
use framex_worker::{
    init_tracing, shutdown_on_signal, ConsumerLoop, NotificationDispatcher, WorkerConfig, WorkerError,
    WorkerResult,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    install_crypto_provider();

    info!("Starting framex-notifier");

    if let Err(e) = run().await {
        error!("Notification service failed: {}", e);
        std::process::exit(1);
    }

    info!("Notification service shutdown complete");
}

async fn run() -> WorkerResult<()> {
    let config = WorkerConfig::from_env();
    let smtp_config = SmtpConfig::from_env()?;
    let mailer: Arc<dyn framex_notify::Mailer> = Arc::from(mailer::from_config(&smtp_config)?);
    let dispatcher = Arc::new(NotificationDispatcher::new(Arc::clone(&mailer)));

    if std::env::var("SEND_TEST_EMAIL").map(|v| v == "true").unwrap_or(false) {
        return send_test_email(&dispatcher).await;
    }

    if let Err(e) = mailer.check().await {
        warn!(error = %e, "Mail transport check failed, sends will be retried");
    }

    let queue_config = QueueConfig::from_env()?;
    let broker = connect_broker(&queue_config).await?;

    let shutdown = shutdown_on_signal();
    let consumer = ConsumerLoop::new(
        broker,
        queue_config.notifications_queue.clone(),
        config.consumer_name.clone(),
        dispatcher,
    )
    .with_dead_letter_queue(queue_config.dead_letter_queue.clone())
    .with_error_backoff(config.error_backoff);

    consumer.run(shutdown.clone()).await?;
    if !*shutdown.borrow() {
        return Err(WorkerError::queue_failed(format!(
            "consumer of '{}' stopped unexpectedly",
            consumer.queue()
        )));
    }
    Ok(())
}

async fn send_test_email(dispatcher: &NotificationDispatcher) -> WorkerResult<()> {
    let notification = NotificationRequest {
        user_id: "test".to_string(),
        user_email: std::env::var("TEST_EMAIL").unwrap_or_else(|_| "test@example.com".to_string()),
        user_name: "Test User".to_string(),
        video_id: VideoId::from("test_123"),
        video_title: "Test video".to_string(),
        status: "completed".to_string(),
        error_message: None,
        processed_at: Utc::now(),
        kind: NotificationKind::Success,
    };

    info!(to = %notification.user_email, "Sending test e-mail");
    dispatcher.send(&notification).await?;
    info!("Test e-mail sent");
    Ok(())
}
