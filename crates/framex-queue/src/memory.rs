//! In-process broker for tests and local runs.
//!
//! Mirrors the AMQP contract: FIFO per queue, unacknowledged deliveries are
//! held aside until settled, and a requeued message goes back to the head of
//! its queue flagged as redelivered. A delivery dropped without being settled
//! is requeued the same way, as a closed AMQP channel would do.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::broker::{Broker, Delivery, DeliveryHandle, Subscription};
use crate::error::{QueueError, QueueResult};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    payload: Vec<u8>,
    redelivered: bool,
}

/// Counters for one in-memory queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryQueueStats {
    pub published: u64,
    pub delivered: u64,
    pub acked: u64,
    pub requeued: u64,
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct MemoryQueue {
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<u64, StoredMessage>,
    stats: MemoryQueueStats,
    /// Number of upcoming publishes that fail
    failing_publishes: u32,
    notify: Arc<Notify>,
}

#[derive(Debug, Default)]
struct Shared {
    queues: Mutex<HashMap<String, MemoryQueue>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    closed_notify: Notify,
}

/// In-memory broker. Cloning shares the same queues.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publishes to `queue` fail.
    pub async fn fail_next_publishes(&self, queue: &str, count: u32) {
        let mut queues = self.shared.queues.lock().await;
        queues.entry(queue.to_string()).or_default().failing_publishes = count;
    }

    /// Messages waiting for delivery.
    pub async fn ready_count(&self, queue: &str) -> usize {
        let queues = self.shared.queues.lock().await;
        queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Messages delivered but not yet settled.
    pub async fn unacked_count(&self, queue: &str) -> usize {
        let queues = self.shared.queues.lock().await;
        queues.get(queue).map_or(0, |q| q.unacked.len())
    }

    pub async fn stats(&self, queue: &str) -> MemoryQueueStats {
        let queues = self.shared.queues.lock().await;
        queues.get(queue).map(|q| q.stats).unwrap_or_default()
    }

    /// Remove and return every ready payload of `queue`.
    pub async fn drain(&self, queue: &str) -> Vec<Vec<u8>> {
        let mut queues = self.shared.queues.lock().await;
        match queues.get_mut(queue) {
            Some(q) => q.ready.drain(..).map(|m| m.payload).collect(),
            None => Vec::new(),
        }
    }

    /// Close every subscription; pending `next_delivery` calls return `None`.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.closed_notify.notify_waiters();
    }

    async fn settle(&self, queue: &str, id: u64, outcome: Settlement) -> QueueResult<()> {
        let mut queues = self.shared.queues.lock().await;
        let q = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::settle_failed(format!("unknown queue {}", queue)))?;
        let mut message = q
            .unacked
            .remove(&id)
            .ok_or_else(|| QueueError::settle_failed(format!("delivery {} already settled", id)))?;

        match outcome {
            Settlement::Ack => q.stats.acked += 1,
            Settlement::Requeue => {
                q.stats.requeued += 1;
                message.redelivered = true;
                q.ready.push_front(message);
                q.notify.notify_one();
            }
            Settlement::Reject => q.stats.rejected += 1,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Settlement {
    Ack,
    Requeue,
    Reject,
}

#[async_trait]
impl Broker for MemoryBroker {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn declare(&self, queue: &str) -> QueueResult<()> {
        let mut queues = self.shared.queues.lock().await;
        queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<()> {
        let mut queues = self.shared.queues.lock().await;
        let q = queues.entry(queue.to_string()).or_default();

        if q.failing_publishes > 0 {
            q.failing_publishes -= 1;
            return Err(QueueError::publish_failed(queue, "publish rejected by memory broker"));
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        q.ready.push_back(StoredMessage {
            id,
            payload: payload.to_vec(),
            redelivered: false,
        });
        q.stats.published += 1;
        q.notify.notify_one();
        Ok(())
    }

    async fn consume(&self, queue: &str, _consumer: &str) -> QueueResult<Box<dyn Subscription>> {
        let notify = {
            let mut queues = self.shared.queues.lock().await;
            queues.entry(queue.to_string()).or_default().notify.clone()
        };
        Ok(Box::new(MemorySubscription {
            broker: self.clone(),
            queue: queue.to_string(),
            notify,
        }))
    }

    async fn depth(&self, queue: &str) -> QueueResult<u64> {
        Ok(self.ready_count(queue).await as u64)
    }

    async fn health_check(&self) -> QueueResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(QueueError::connection_failed("memory broker closed"));
        }
        Ok(())
    }
}

struct MemorySubscription {
    broker: MemoryBroker,
    queue: String,
    notify: Arc<Notify>,
}

impl MemorySubscription {
    async fn try_take(&self) -> Option<StoredMessage> {
        let mut queues = self.broker.shared.queues.lock().await;
        let q = queues.get_mut(&self.queue)?;
        let message = q.ready.pop_front()?;
        q.unacked.insert(message.id, message.clone());
        q.stats.delivered += 1;
        Some(message)
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_delivery(&mut self) -> QueueResult<Option<Delivery>> {
        loop {
            let closed = self.broker.shared.closed_notify.notified();
            tokio::pin!(closed);
            closed.as_mut().enable();

            if self.broker.shared.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            if let Some(message) = self.try_take().await {
                let handle = MemoryDeliveryHandle {
                    broker: self.broker.clone(),
                    queue: self.queue.clone(),
                    id: message.id,
                    settled: AtomicBool::new(false),
                };
                return Ok(Some(Delivery::new(
                    message.payload,
                    message.redelivered,
                    Box::new(handle),
                )));
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = closed => {}
            }
        }
    }
}

struct MemoryDeliveryHandle {
    broker: MemoryBroker,
    queue: String,
    id: u64,
    settled: AtomicBool,
}

#[async_trait]
impl DeliveryHandle for MemoryDeliveryHandle {
    async fn ack(&self) -> QueueResult<()> {
        self.settled.store(true, Ordering::SeqCst);
        self.broker.settle(&self.queue, self.id, Settlement::Ack).await
    }

    async fn nack(&self, requeue: bool) -> QueueResult<()> {
        let outcome = if requeue {
            Settlement::Requeue
        } else {
            Settlement::Reject
        };
        self.settled.store(true, Ordering::SeqCst);
        self.broker.settle(&self.queue, self.id, outcome).await
    }
}

impl Drop for MemoryDeliveryHandle {
    fn drop(&mut self) {
        if self.settled.load(Ordering::SeqCst) {
            return;
        }
        // Without a runtime the broker is being torn down with it
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let broker = self.broker.clone();
        let queue = std::mem::take(&mut self.queue);
        let id = self.id;
        runtime.spawn(async move {
            if let Err(e) = broker.settle(&queue, id, Settlement::Requeue).await {
                debug!(queue = %queue, id, error = %e, "dropped delivery not requeued");
            }
        });
    }
}
