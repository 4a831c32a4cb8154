//! Sequential queue consumption.
//!
//! One loop per process and queue: take a delivery, hand it to a
//! [`MessageHandler`], settle it according to the returned [`Disposition`].
//! The next delivery is only requested once the previous one is settled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use framex_queue::{Broker, Delivery, Subscription};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::WorkerResult;
use crate::metrics;
use crate::retry::LogThrottle;

/// How a delivery is settled once handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done; remove from the queue
    Ack,
    /// Transient failure; hand back for redelivery
    Requeue,
    /// Poison message; drop (after dead-lettering, when configured)
    Reject,
}

/// Handles the payload of one delivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, payload: &[u8], redelivered: bool) -> Disposition;

    /// Called after the delivery has been settled with the broker.
    async fn on_settled(&self, _disposition: Disposition) {}
}

/// Consumes one queue with one handler.
pub struct ConsumerLoop {
    broker: Arc<dyn Broker>,
    queue: String,
    consumer_name: String,
    dead_letter_queue: Option<String>,
    handler: Arc<dyn MessageHandler>,
    error_backoff: Duration,
}

impl ConsumerLoop {
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: impl Into<String>,
        consumer_name: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            broker,
            queue: queue.into(),
            consumer_name: consumer_name.into(),
            dead_letter_queue: None,
            handler,
            error_backoff: Duration::from_secs(5),
        }
    }

    /// Copy rejected payloads to `queue` before dropping them.
    pub fn with_dead_letter_queue(mut self, queue: Option<String>) -> Self {
        self.dead_letter_queue = queue;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub async fn subscribe(&self) -> WorkerResult<Box<dyn Subscription>> {
        Ok(self.broker.consume(&self.queue, &self.consumer_name).await?)
    }

    /// Consume until shutdown is signalled or the subscription closes.
    ///
    /// A message being handled when shutdown arrives is finished and settled
    /// first; only the wait for the next delivery is interrupted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerResult<()> {
        let mut subscription = self.subscribe().await?;
        let mut failures = LogThrottle::new(5);

        info!(
            queue = %self.queue,
            handler = self.handler.name(),
            consumer = %self.consumer_name,
            "Consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                next = subscription.next_delivery() => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    failures.recovered();
                    self.process(delivery).await;
                }
                Ok(None) => {
                    warn!(queue = %self.queue, "Subscription closed by broker");
                    break;
                }
                Err(e) => {
                    if failures.failed() {
                        error!(queue = %self.queue, error = %e, "Failed to receive delivery");
                    }
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
        }

        info!(queue = %self.queue, handler = self.handler.name(), "Consumer stopped");
        Ok(())
    }

    /// Take, handle and settle a single delivery.
    ///
    /// Returns `None` when the subscription has closed.
    pub async fn step(&self, subscription: &mut dyn Subscription) -> WorkerResult<Option<Disposition>> {
        match subscription.next_delivery().await? {
            Some(delivery) => Ok(Some(self.process(delivery).await)),
            None => Ok(None),
        }
    }

    async fn process(&self, delivery: Delivery) -> Disposition {
        let disposition = self
            .handler
            .handle(&delivery.payload, delivery.redelivered)
            .await;
        self.settle(delivery, disposition).await;
        self.handler.on_settled(disposition).await;
        disposition
    }

    async fn settle(&self, delivery: Delivery, disposition: Disposition) {
        let outcome = match disposition {
            Disposition::Ack => delivery.ack().await,
            Disposition::Requeue => {
                metrics::record_redelivery(&self.queue);
                delivery.nack(true).await
            }
            Disposition::Reject => {
                let dead_lettered = self.dead_letter(&delivery.payload).await;
                metrics::record_rejection(&self.queue, dead_lettered);
                delivery.nack(false).await
            }
        };

        match outcome {
            Ok(()) => debug!(queue = %self.queue, ?disposition, "Delivery settled"),
            // The broker redelivers unsettled messages once the channel drops
            Err(e) => error!(queue = %self.queue, ?disposition, error = %e, "Failed to settle delivery"),
        }
    }

    async fn dead_letter(&self, payload: &[u8]) -> bool {
        let Some(dlq) = &self.dead_letter_queue else {
            return false;
        };
        match self.broker.publish(dlq, payload).await {
            Ok(()) => {
                warn!(queue = %self.queue, dead_letter_queue = %dlq, "Poison message dead-lettered");
                true
            }
            Err(e) => {
                error!(
                    queue = %self.queue,
                    dead_letter_queue = %dlq,
                    error = %e,
                    "Failed to dead-letter poison message, dropping it"
                );
                false
            }
        }
    }
}

/// Watch channel flipped to `true` on Ctrl-C (and SIGTERM on Unix).
pub fn shutdown_on_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        let _ = tx.send(true);
    });
    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Resolves once `shutdown` flips to `true`; for axum's graceful shutdown.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framex_queue::MemoryBroker;
    use std::sync::Mutex;

    /// Settles payloads by their first byte: a = ack, r = requeue once, anything else = reject.
    #[derive(Default)]
    struct ScriptedHandler {
        seen: Mutex<Vec<(Vec<u8>, bool)>>,
        settled: Mutex<Vec<Disposition>>,
    }

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn handle(&self, payload: &[u8], redelivered: bool) -> Disposition {
            self.seen.lock().unwrap().push((payload.to_vec(), redelivered));
            match payload.first() {
                Some(b'a') => Disposition::Ack,
                Some(b'r') if !redelivered => Disposition::Requeue,
                Some(b'r') => Disposition::Ack,
                _ => Disposition::Reject,
            }
        }

        async fn on_settled(&self, disposition: Disposition) {
            self.settled.lock().unwrap().push(disposition);
        }
    }

    async fn setup(dlq: Option<&str>) -> (MemoryBroker, Arc<ScriptedHandler>, ConsumerLoop) {
        let broker = MemoryBroker::new();
        let handler = Arc::new(ScriptedHandler::default());
        let consumer = ConsumerLoop::new(Arc::new(broker.clone()), "jobs", "test", handler.clone())
            .with_dead_letter_queue(dlq.map(str::to_string));
        (broker, handler, consumer)
    }

    #[tokio::test]
    async fn test_ack_removes_message() {
        let (broker, handler, consumer) = setup(None).await;
        broker.publish("jobs", b"a1").await.unwrap();

        let mut sub = consumer.subscribe().await.unwrap();
        assert_eq!(consumer.step(sub.as_mut()).await.unwrap(), Some(Disposition::Ack));

        assert_eq!(broker.ready_count("jobs").await, 0);
        assert_eq!(broker.unacked_count("jobs").await, 0);
        assert_eq!(*handler.settled.lock().unwrap(), vec![Disposition::Ack]);
    }

    #[tokio::test]
    async fn test_requeue_is_redelivered() {
        let (broker, handler, consumer) = setup(None).await;
        broker.publish("jobs", b"r1").await.unwrap();

        let mut sub = consumer.subscribe().await.unwrap();
        assert_eq!(consumer.step(sub.as_mut()).await.unwrap(), Some(Disposition::Requeue));
        assert_eq!(consumer.step(sub.as_mut()).await.unwrap(), Some(Disposition::Ack));

        let seen = handler.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(b"r1".to_vec(), false), (b"r1".to_vec(), true)]);
        assert_eq!(broker.stats("jobs").await.requeued, 1);
    }

    #[tokio::test]
    async fn test_reject_without_dead_letter_drops() {
        let (broker, _, consumer) = setup(None).await;
        broker.publish("jobs", b"xx").await.unwrap();

        let mut sub = consumer.subscribe().await.unwrap();
        assert_eq!(consumer.step(sub.as_mut()).await.unwrap(), Some(Disposition::Reject));

        assert_eq!(broker.ready_count("jobs").await, 0);
        assert_eq!(broker.stats("jobs").await.rejected, 1);
    }

    #[tokio::test]
    async fn test_reject_with_dead_letter_keeps_payload() {
        let (broker, _, consumer) = setup(Some("jobs.dead")).await;
        broker.publish("jobs", b"{not json").await.unwrap();

        let mut sub = consumer.subscribe().await.unwrap();
        consumer.step(sub.as_mut()).await.unwrap();

        assert_eq!(broker.drain("jobs.dead").await, vec![b"{not json".to_vec()]);
        assert_eq!(broker.ready_count("jobs").await, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (broker, handler, consumer) = setup(None).await;
        broker.publish("jobs", b"a1").await.unwrap();
        broker.publish("jobs", b"a2").await.unwrap();

        let (tx, rx) = watch::channel(false);
        let consumer = Arc::new(consumer);
        let task = tokio::spawn({
            let consumer = consumer.clone();
            async move { consumer.run(rx).await }
        });

        while handler.settled.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("consumer did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(broker.ready_count("jobs").await, 0);
    }

    #[tokio::test]
    async fn test_run_ends_when_broker_closes() {
        let (broker, _, consumer) = setup(None).await;
        let (_tx, rx) = watch::channel(false);

        broker.close();
        tokio::time::timeout(Duration::from_secs(5), consumer.run(rx))
            .await
            .expect("consumer did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_shutdown() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_for_shutdown(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
