//! Queue envelopes exchanged between pipeline stages.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::{JobStatus, NotificationKind};
use crate::video::VideoId;

/// Metadata key holding the upload's original file name.
pub const META_ORIGINAL_FILENAME: &str = "original_filename";
/// Metadata key holding the frame count of a completed job.
pub const META_FRAME_COUNT: &str = "frame_count";
/// Metadata key holding the archive size of a completed job.
pub const META_ZIP_SIZE: &str = "zip_size";
/// Metadata key naming the pipeline stage that failed.
pub const META_FAILED_STAGE: &str = "failed_stage";

/// Intake message: a raw upload waiting for frame extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingRequest {
    pub video_id: VideoId,
    /// Original file name of the upload
    pub filename: String,
    /// Bucket holding the raw upload
    pub bucket: String,
    /// Object key of the raw upload
    pub object_name: String,
    pub user_id: String,
}

/// Outcome of one processing attempt, published to the results queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingResult {
    pub video_id: VideoId,
    pub status: JobStatus,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub frame_count: u32,
    #[serde(default)]
    pub zip_size: u64,
    #[serde(default)]
    pub zip_object_name: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub user_id: String,
    /// Failure message, present only when `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResult {
    /// Build a completed result for a request.
    pub fn completed(
        request: &ProcessingRequest,
        frame_count: u32,
        zip_size: u64,
        zip_object_name: impl Into<String>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            META_ORIGINAL_FILENAME.to_string(),
            Value::String(request.filename.clone()),
        );
        metadata.insert(META_FRAME_COUNT.to_string(), Value::from(frame_count));
        metadata.insert(META_ZIP_SIZE.to_string(), Value::from(zip_size));

        Self {
            video_id: request.video_id.clone(),
            status: JobStatus::Completed,
            processed_at: Utc::now(),
            frame_count,
            zip_size,
            zip_object_name: zip_object_name.into(),
            metadata,
            user_id: request.user_id.clone(),
            error: None,
        }
    }

    /// Build an error result naming the stage that failed.
    pub fn failed(request: &ProcessingRequest, stage: &str, message: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            META_ORIGINAL_FILENAME.to_string(),
            Value::String(request.filename.clone()),
        );
        metadata.insert(META_FAILED_STAGE.to_string(), Value::String(stage.to_string()));

        Self {
            video_id: request.video_id.clone(),
            status: JobStatus::Error,
            processed_at: Utc::now(),
            frame_count: 0,
            zip_size: 0,
            zip_object_name: String::new(),
            metadata,
            user_id: request.user_id.clone(),
            error: Some(message.into()),
        }
    }

    /// Original file name recorded in the metadata, if any.
    pub fn original_filename(&self) -> Option<&str> {
        self.metadata
            .get(META_ORIGINAL_FILENAME)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Resolved mail recipient of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

/// Message asking the notification service to inform a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationRequest {
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub video_id: VideoId,
    pub video_title: String,
    /// Raw status string; templates fall back to a generic body for unknown values
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

impl NotificationRequest {
    /// Build the notification for a processing result.
    pub fn for_result(result: &ProcessingResult, recipient: &Recipient, title: &str) -> Self {
        Self {
            user_id: result.user_id.clone(),
            user_email: recipient.email.clone(),
            user_name: recipient.name.clone(),
            video_id: result.video_id.clone(),
            video_title: title.to_string(),
            status: result.status.as_str().to_string(),
            error_message: result.error.clone(),
            processed_at: result.processed_at,
            kind: NotificationKind::from(result.status),
        }
    }
}
