//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Queue declare failed for {queue}: {message}")]
    DeclareFailed { queue: String, message: String },

    #[error("Publish to {queue} failed: {message}")]
    PublishFailed { queue: String, message: String },

    #[error("Consume from {queue} failed: {message}")]
    ConsumeFailed { queue: String, message: String },

    #[error("Settlement failed: {0}")]
    SettleFailed(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn declare_failed(queue: &str, msg: impl Into<String>) -> Self {
        Self::DeclareFailed {
            queue: queue.to_string(),
            message: msg.into(),
        }
    }

    pub fn publish_failed(queue: &str, msg: impl Into<String>) -> Self {
        Self::PublishFailed {
            queue: queue.to_string(),
            message: msg.into(),
        }
    }

    pub fn consume_failed(queue: &str, msg: impl Into<String>) -> Self {
        Self::ConsumeFailed {
            queue: queue.to_string(),
            message: msg.into(),
        }
    }

    pub fn settle_failed(msg: impl Into<String>) -> Self {
        Self::SettleFailed(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }
}
