//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue operation failed: {0}")]
    QueueFailed(String),

    #[error("Codec error: {0}")]
    Codec(#[from] framex_models::CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] framex_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] framex_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] framex_queue::QueueError),

    #[error("Notification error: {0}")]
    Notify(#[from] framex_notify::NotifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn queue_failed(msg: impl Into<String>) -> Self {
        Self::QueueFailed(msg.into())
    }
}
