//! Durable queue broker interface.
//!
//! Every pipeline stage talks to its queues through [`Broker`]. Deliveries are
//! settled exactly once: acknowledged, requeued for redelivery, or rejected.

use std::fmt;

use async_trait::async_trait;

use crate::error::QueueResult;

/// A durable, manually acknowledged queue service.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Short name of the back-end, used in logs and readiness output.
    fn provider_name(&self) -> &'static str;

    /// Declare `queue` as durable. Idempotent.
    async fn declare(&self, queue: &str) -> QueueResult<()>;

    /// Publish a persistent message. Returns only once the broker has accepted it.
    async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<()>;

    /// Start consuming `queue` under the given consumer name.
    async fn consume(&self, queue: &str, consumer: &str) -> QueueResult<Box<dyn Subscription>>;

    /// Number of messages ready for delivery.
    async fn depth(&self, queue: &str) -> QueueResult<u64>;

    /// Cheap round trip to the broker.
    async fn health_check(&self) -> QueueResult<()>;
}

/// An open consumer on one queue.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery. `None` once the subscription is closed.
    async fn next_delivery(&mut self) -> QueueResult<Option<Delivery>>;
}

/// Back-end specific settlement of one delivery.
#[async_trait]
pub trait DeliveryHandle: Send + Sync {
    async fn ack(&self) -> QueueResult<()>;

    async fn nack(&self, requeue: bool) -> QueueResult<()>;
}

/// A message handed to a consumer, awaiting settlement.
pub struct Delivery {
    pub payload: Vec<u8>,
    /// Whether the broker delivered this message before
    pub redelivered: bool,
    handle: Box<dyn DeliveryHandle>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, redelivered: bool, handle: Box<dyn DeliveryHandle>) -> Self {
        Self {
            payload,
            redelivered,
            handle,
        }
    }

    /// Acknowledge: the message is removed from the queue.
    pub async fn ack(self) -> QueueResult<()> {
        self.handle.ack().await
    }

    /// Negative acknowledge, optionally putting the message back for redelivery.
    pub async fn nack(self, requeue: bool) -> QueueResult<()> {
        self.handle.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}
