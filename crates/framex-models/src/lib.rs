//! Shared data models for the FrameX pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - The three queue envelopes (processing request, result, notification)
//! - The envelope codec used by every producer and consumer
//! - Job and notification status variants
//! - Queue projections served by the status API
//! - Catalog records kept by the storage service

pub mod codec;
pub mod envelope;
pub mod projection;
pub mod record;
pub mod status;
pub mod video;

// Re-export common types
pub use codec::{decode, encode, CodecError, CodecResult, Envelope};
pub use envelope::{NotificationRequest, ProcessingRequest, ProcessingResult, Recipient};
pub use projection::{
    position_cache_key, QueuePosition, QueueStatus, POSITION_CACHE_PREFIX, POSITION_TTL_SECS,
    STATUS_CACHE_KEY, STATUS_TTL_SECS,
};
pub use record::{UserStats, VideoRecord, UNTITLED_VIDEO};
pub use status::{JobStatus, NotificationKind};
pub use video::VideoId;
