//! Request to e-mail: processor, result consumer and dispatcher wired through
//! one in-memory broker.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use framex_models::{decode, JobStatus, NotificationKind, NotificationRequest, VideoId};
use framex_notify::{Mailer, NotifyResult, RenderedEmail, StaticDirectory};
use framex_queue::Broker;
use framex_storage::{Catalog, MemoryCatalog};
use framex_worker::{ConsumerLoop, Disposition, NotificationDispatcher, ResultConsumer};
use mockall::mock;
use tokio::sync::watch;

mock! {
    pub Mailer {}

    #[async_trait]
    impl Mailer for Mailer {
        async fn send(&self, to_email: &str, to_name: &str, email: &RenderedEmail) -> NotifyResult<()>;
        async fn check(&self) -> NotifyResult<()>;
    }
}

type Outbox = Arc<Mutex<Vec<(String, RenderedEmail)>>>;

fn recording_mailer(outbox: Outbox) -> MockMailer {
    let mut mailer = MockMailer::new();
    mailer.expect_send().returning(move |to, _name, email| {
        outbox.lock().unwrap().push((to.to_string(), email.clone()));
        Ok(())
    });
    mailer
}

fn result_consumer(harness: &Harness, catalog: Arc<MemoryCatalog>) -> ConsumerLoop {
    let broker: Arc<dyn Broker> = Arc::new(harness.broker.clone());
    ConsumerLoop::new(
        Arc::clone(&broker),
        RESULTS,
        "test-storage",
        Arc::new(ResultConsumer::new(
            catalog,
            Arc::new(StaticDirectory::new("ana@example.com", "Ana")),
            broker,
            NOTIFICATIONS,
        )),
    )
}

fn notification_consumer(harness: &Harness, mailer: MockMailer) -> ConsumerLoop {
    ConsumerLoop::new(
        Arc::new(harness.broker.clone()),
        NOTIFICATIONS,
        "test-notifier",
        Arc::new(NotificationDispatcher::new(Arc::new(mailer))),
    )
}

async fn step_once(consumer: &ConsumerLoop) -> Disposition {
    let mut subscription = consumer.subscribe().await.unwrap();
    consumer
        .step(subscription.as_mut())
        .await
        .unwrap()
        .expect("a delivery")
}

#[tokio::test]
async fn test_completed_video_reaches_catalog_and_inbox() {
    let harness = Harness::new(ExtractBehavior::Frames(3)).await;
    let catalog = Arc::new(MemoryCatalog::new());
    let outbox = Outbox::default();

    let mut request = harness.submit("v1").await;
    request.filename = "holiday.mp4".to_string();
    harness.broker.drain(INTAKE).await;
    harness.enqueue(&request).await;

    assert_eq!(step_once(&harness.intake_consumer()).await, Disposition::Ack);
    assert_eq!(step_once(&result_consumer(&harness, catalog.clone())).await, Disposition::Ack);

    let record = catalog.get(&VideoId::from("v1")).await.expect("catalog entry");
    assert_eq!(record.title, "holiday.mp4");
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.frame_count, 3);
    assert_eq!(record.zip_object_name, "frames_v1.zip");
    assert_eq!(record.user_id, "u1");

    let queued = harness.broker.drain(NOTIFICATIONS).await;
    assert_eq!(queued.len(), 1);
    let notification: NotificationRequest = decode(&queued[0]).unwrap();
    assert_eq!(notification.video_title, "holiday.mp4");
    assert_eq!(notification.user_email, "ana@example.com");
    assert_eq!(notification.status, "completed");
    assert_eq!(notification.kind, NotificationKind::Success);
    harness.broker.publish(NOTIFICATIONS, &queued[0]).await.unwrap();

    let notifier = notification_consumer(&harness, recording_mailer(outbox.clone()));
    assert_eq!(step_once(&notifier).await, Disposition::Ack);

    let sent = outbox.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ana@example.com");
    assert!(sent[0].1.html.contains("holiday.mp4"));
    assert!(sent[0].1.html.contains("Video processed"));
}

#[tokio::test]
async fn test_failed_video_sends_error_mail() {
    let harness = Harness::new(ExtractBehavior::Fail).await;
    let catalog = Arc::new(MemoryCatalog::new());
    let outbox = Outbox::default();
    harness.submit("v1").await;

    step_once(&harness.intake_consumer()).await;
    step_once(&result_consumer(&harness, catalog.clone())).await;
    step_once(&notification_consumer(&harness, recording_mailer(outbox.clone()))).await;

    let record = catalog.get(&VideoId::from("v1")).await.unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert!(record.error.unwrap().starts_with("frame extraction failed"));

    let sent = outbox.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.html.contains("Processing failed"));
    assert!(sent[0].1.html.contains("frame extraction failed"));
}

#[tokio::test]
async fn test_no_recipient_skips_notification() {
    let harness = Harness::new(ExtractBehavior::Frames(1)).await;
    let catalog = Arc::new(MemoryCatalog::new());
    harness.submit("v1").await;

    step_once(&harness.intake_consumer()).await;

    let broker: Arc<dyn Broker> = Arc::new(harness.broker.clone());
    let consumer = ConsumerLoop::new(
        Arc::clone(&broker),
        RESULTS,
        "test-storage",
        Arc::new(ResultConsumer::new(
            catalog.clone(),
            Arc::new(StaticDirectory::new("", "Nobody")),
            broker,
            NOTIFICATIONS,
        )),
    );
    assert_eq!(step_once(&consumer).await, Disposition::Ack);

    assert_eq!(catalog.len().await, 1);
    assert_eq!(harness.broker.ready_count(NOTIFICATIONS).await, 0);
}

#[tokio::test]
async fn test_notification_publish_failure_requeues_result() {
    let harness = Harness::new(ExtractBehavior::Frames(1)).await;
    let catalog = Arc::new(MemoryCatalog::new());
    harness.submit("v1").await;
    step_once(&harness.intake_consumer()).await;

    harness.broker.fail_next_publishes(NOTIFICATIONS, 1).await;
    let consumer = result_consumer(&harness, catalog.clone());
    let mut subscription = consumer.subscribe().await.unwrap();

    let first = consumer.step(subscription.as_mut()).await.unwrap();
    assert_eq!(first, Some(Disposition::Requeue));
    let second = consumer.step(subscription.as_mut()).await.unwrap();
    assert_eq!(second, Some(Disposition::Ack));

    // Upserts are idempotent across redelivery
    assert_eq!(catalog.len().await, 1);
    assert_eq!(harness.broker.ready_count(NOTIFICATIONS).await, 1);
}

#[tokio::test]
async fn test_competing_workers_process_every_request_once() {
    const JOBS: usize = 6;

    let harness = Harness::new(ExtractBehavior::Frames(2)).await;
    let catalog = Arc::new(MemoryCatalog::new());
    let outbox = Outbox::default();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut consumers: Vec<ConsumerLoop> = (0..3).map(|_| harness.intake_consumer()).collect();
    consumers.push(result_consumer(&harness, catalog.clone()));
    consumers.push(notification_consumer(&harness, recording_mailer(outbox.clone())));

    let tasks: Vec<_> = consumers
        .into_iter()
        .map(|consumer| {
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { consumer.run(shutdown).await })
        })
        .collect();

    for i in 0..JOBS {
        harness.submit(&format!("v{}", i)).await;
    }

    tokio::time::timeout(Duration::from_secs(10), async {
        while outbox.lock().unwrap().len() < JOBS {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("every job notified in time");

    shutdown_tx.send(true).unwrap();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(catalog.len().await, JOBS);
    let records = catalog.list_by_owner("u1").await;
    assert!(records.iter().all(|r| r.status == JobStatus::Completed));

    assert_eq!(harness.extractor.calls(), JOBS);
    assert_eq!(harness.broker.ready_count(INTAKE).await, 0);
    assert_eq!(harness.broker.unacked_count(INTAKE).await, 0);
    assert_eq!(harness.broker.stats(INTAKE).await.acked, JOBS as u64);
    assert_eq!(harness.work_dir_entries(), 0);
}
