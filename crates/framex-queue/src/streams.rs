//! Redis Streams broker.
//!
//! Each queue is a stream with one consumer group. A message is an entry with
//! a `payload` field. Ack removes the entry (`XACK` + `XDEL`), requeue appends
//! a copy marked `redelivered` and removes the original, and entries left
//! pending by a crashed consumer are reclaimed with `XAUTOCLAIM`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamPendingReply, StreamReadOptions,
    StreamReadReply,
};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::broker::{Broker, Delivery, DeliveryHandle, Subscription};
use crate::error::{QueueError, QueueResult};

const PAYLOAD_FIELD: &str = "payload";
const REDELIVERED_FIELD: &str = "redelivered";

/// Redis Streams-backed broker.
pub struct StreamsBroker {
    client: redis::Client,
    /// Shared connection for publish, settle and inspection
    conn: MultiplexedConnection,
    group: String,
    block: Duration,
    claim_idle: Duration,
}

impl StreamsBroker {
    pub async fn connect(
        url: &str,
        group: impl Into<String>,
        block: Duration,
        claim_idle: Duration,
    ) -> QueueResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(format!("Redis connection failed: {}", e)))?;

        info!("Connected to Redis Streams at {}", crate::amqp::redact_url(url));

        Ok(Self {
            client,
            conn,
            group: group.into(),
            block,
            claim_idle,
        })
    }
}

#[async_trait]
impl Broker for StreamsBroker {
    fn provider_name(&self) -> &'static str {
        "redis-streams"
    }

    async fn declare(&self, queue: &str) -> QueueResult<()> {
        let mut conn = self.conn.clone();

        // Start at 0 so entries published before the group existed are delivered
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(queue)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => info!("Created consumer group {} on {}", self.group, queue),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {} on {}", self.group, queue);
            }
            Err(e) => return Err(QueueError::declare_failed(queue, e.to_string())),
        }
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(queue, "*", &[(PAYLOAD_FIELD, payload)])
            .await
            .map_err(|e| QueueError::publish_failed(queue, e.to_string()))?;
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer: &str) -> QueueResult<Box<dyn Subscription>> {
        self.declare(queue).await?;

        // Blocking reads get a dedicated connection
        let read_conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::consume_failed(queue, e.to_string()))?;

        Ok(Box::new(StreamsSubscription {
            read_conn,
            settle_conn: self.conn.clone(),
            queue: queue.to_string(),
            group: self.group.clone(),
            consumer: consumer.to_string(),
            block: self.block,
            claim_idle: self.claim_idle,
            last_claim: None,
        }))
    }

    async fn depth(&self, queue: &str) -> QueueResult<u64> {
        let mut conn = self.conn.clone();
        let length: u64 = conn.xlen(queue).await?;
        let pending: StreamPendingReply = match conn.xpending(queue, &self.group).await {
            Ok(reply) => reply,
            // No group yet means nothing has been delivered
            Err(e) if e.to_string().contains("NOGROUP") => return Ok(length),
            Err(e) => return Err(e.into()),
        };
        Ok(length.saturating_sub(pending.count() as u64))
    }

    async fn health_check(&self) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

struct StreamsSubscription {
    read_conn: MultiplexedConnection,
    settle_conn: MultiplexedConnection,
    queue: String,
    group: String,
    consumer: String,
    block: Duration,
    claim_idle: Duration,
    last_claim: Option<Instant>,
}

impl StreamsSubscription {
    fn delivery(&self, entry: StreamId, reclaimed: bool) -> Delivery {
        let handle = StreamsDeliveryHandle {
            conn: self.settle_conn.clone(),
            queue: self.queue.clone(),
            group: self.group.clone(),
            id: entry.id.clone(),
        };

        let payload: Vec<u8> = match entry.get(PAYLOAD_FIELD) {
            Some(payload) => payload,
            None => {
                warn!(queue = %self.queue, id = %entry.id, "Stream entry without payload field");
                Vec::new()
            }
        };
        let redelivered = reclaimed || entry.contains_key(REDELIVERED_FIELD);

        Delivery::new(payload, redelivered, Box::new(handle))
    }

    /// Take over one entry left pending by another consumer for longer than `claim_idle`.
    async fn reclaim(&mut self) -> QueueResult<Option<StreamId>> {
        let due = self
            .last_claim
            .map_or(true, |at| at.elapsed() >= self.claim_idle / 2);
        if !due {
            return Ok(None);
        }
        self.last_claim = Some(Instant::now());

        let reply: StreamAutoClaimReply = self
            .read_conn
            .xautoclaim_options(
                &self.queue,
                &self.group,
                &self.consumer,
                self.claim_idle.as_millis() as u64,
                "0-0",
                StreamAutoClaimOptions::default().count(1),
            )
            .await?;

        let entry = reply.claimed.into_iter().next();
        if let Some(entry) = &entry {
            warn!(queue = %self.queue, id = %entry.id, "Reclaimed stale pending entry");
        }
        Ok(entry)
    }
}

#[async_trait]
impl Subscription for StreamsSubscription {
    async fn next_delivery(&mut self) -> QueueResult<Option<Delivery>> {
        loop {
            if let Some(entry) = self.reclaim().await? {
                return Ok(Some(self.delivery(entry, true)));
            }

            let options = StreamReadOptions::default()
                .group(&self.group, &self.consumer)
                .count(1)
                .block(self.block.as_millis() as usize);

            let reply: Option<StreamReadReply> = self
                .read_conn
                .xread_options(&[&self.queue], &[">"], &options)
                .await
                .map_err(|e| QueueError::consume_failed(&self.queue, e.to_string()))?;

            let entry = reply
                .into_iter()
                .flat_map(|r| r.keys)
                .flat_map(|k| k.ids)
                .next();

            if let Some(entry) = entry {
                return Ok(Some(self.delivery(entry, false)));
            }
        }
    }
}

struct StreamsDeliveryHandle {
    conn: MultiplexedConnection,
    queue: String,
    group: String,
    id: String,
}

impl StreamsDeliveryHandle {
    async fn remove(&self) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: u64 = conn
            .xack(&self.queue, &self.group, &[&self.id])
            .await
            .map_err(|e| QueueError::settle_failed(format!("XACK failed: {}", e)))?;
        let _: u64 = conn
            .xdel(&self.queue, &[&self.id])
            .await
            .map_err(|e| QueueError::settle_failed(format!("XDEL failed: {}", e)))?;
        Ok(())
    }

    async fn payload(&self) -> QueueResult<Vec<u8>> {
        let mut conn = self.conn.clone();
        let reply: redis::streams::StreamRangeReply = conn
            .xrange(&self.queue, &self.id, &self.id)
            .await
            .map_err(|e| QueueError::settle_failed(format!("XRANGE failed: {}", e)))?;
        reply
            .ids
            .into_iter()
            .next()
            .and_then(|entry| entry.get::<Vec<u8>>(PAYLOAD_FIELD))
            .ok_or_else(|| QueueError::settle_failed(format!("entry {} vanished", self.id)))
    }
}

#[async_trait]
impl DeliveryHandle for StreamsDeliveryHandle {
    async fn ack(&self) -> QueueResult<()> {
        self.remove().await
    }

    async fn nack(&self, requeue: bool) -> QueueResult<()> {
        if requeue {
            let payload = self.payload().await?;
            let mut conn = self.conn.clone();
            let _: String = conn
                .xadd(
                    &self.queue,
                    "*",
                    &[(PAYLOAD_FIELD, payload.as_slice()), (REDELIVERED_FIELD, b"1".as_slice())],
                )
                .await
                .map_err(|e| QueueError::settle_failed(format!("requeue failed: {}", e)))?;
        }
        self.remove().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_requeue_is_redelivered() {
        let broker = StreamsBroker::connect(
            &redis_url(),
            "framex-test",
            Duration::from_millis(200),
            Duration::from_secs(60),
        )
        .await
        .unwrap();
        let queue = format!("framex:test:{}", std::process::id());
        broker.declare(&queue).await.unwrap();
        broker.publish(&queue, b"job").await.unwrap();
        assert_eq!(broker.depth(&queue).await.unwrap(), 1);

        let mut sub = broker.consume(&queue, "c1").await.unwrap();
        let first = sub.next_delivery().await.unwrap().unwrap();
        assert!(!first.redelivered);
        assert_eq!(broker.depth(&queue).await.unwrap(), 0);
        first.nack(true).await.unwrap();

        let second = sub.next_delivery().await.unwrap().unwrap();
        assert_eq!(second.payload, b"job");
        assert!(second.redelivered);
        second.ack().await.unwrap();
        assert_eq!(broker.depth(&queue).await.unwrap(), 0);
    }
}
