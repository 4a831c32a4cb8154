//! Job and notification status variants.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of a job as seen by the pipeline and the catalog.
///
/// Only `Completed` and `Error` may appear in a published processing result.
/// `Processing` is used by catalog entries and the processing-started
/// notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    #[serde(alias = "failed")]
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (never revised once published).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category carried in the `type` field of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

impl NotificationKind {
    /// Map a raw status string to its notification category.
    pub fn from_status(status: &str) -> Self {
        match status {
            "completed" => NotificationKind::Success,
            "failed" | "error" => NotificationKind::Error,
            _ => NotificationKind::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Info => "info",
        }
    }
}

impl From<JobStatus> for NotificationKind {
    fn from(status: JobStatus) -> Self {
        Self::from_status(status.as_str())
    }
}
