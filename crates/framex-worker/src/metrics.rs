//! Pipeline metrics recorded by the worker binaries.
//!
//! They go to the process-wide recorder installed by
//! [`crate::runtime::init_metrics`] and are rendered on the worker's
//! `/metrics` route.

use metrics::{counter, histogram};

use crate::pipeline::Stage;

pub mod names {
    pub const MESSAGES_REDELIVERED_TOTAL: &str = "framex_messages_redelivered_total";
    pub const MESSAGES_REJECTED_TOTAL: &str = "framex_messages_rejected_total";
    pub const MESSAGES_DEAD_LETTERED_TOTAL: &str = "framex_messages_dead_lettered_total";

    pub const JOBS_STARTED_TOTAL: &str = "framex_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "framex_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "framex_jobs_failed_total";
    pub const FRAMES_EXTRACTED_TOTAL: &str = "framex_frames_extracted_total";
    pub const JOB_DURATION_SECONDS: &str = "framex_job_duration_seconds";

    pub const DOWNLOAD_DURATION_SECONDS: &str = "framex_download_duration_seconds";
    pub const EXTRACTION_DURATION_SECONDS: &str = "framex_extraction_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "framex_upload_duration_seconds";

    pub const CATALOG_UPSERTS_TOTAL: &str = "framex_catalog_upserts_total";
    pub const NOTIFICATIONS_SENT_TOTAL: &str = "framex_notifications_sent_total";
    pub const NOTIFICATIONS_FAILED_TOTAL: &str = "framex_notifications_failed_total";
}

/// Message handed back to the broker for redelivery.
pub fn record_redelivery(queue: &str) {
    counter!(names::MESSAGES_REDELIVERED_TOTAL, "queue" => queue.to_string()).increment(1);
}

pub fn record_rejection(queue: &str, dead_lettered: bool) {
    let labels = [("queue", queue.to_string())];
    counter!(names::MESSAGES_REJECTED_TOTAL, &labels).increment(1);
    if dead_lettered {
        counter!(names::MESSAGES_DEAD_LETTERED_TOTAL, &labels).increment(1);
    }
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

pub fn record_job_completed(frame_count: u32, duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    counter!(names::FRAMES_EXTRACTED_TOTAL).increment(u64::from(frame_count));
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(stage: Stage) {
    counter!(names::JOBS_FAILED_TOTAL, "stage" => stage.as_str()).increment(1);
}

/// Histogram timing a stage; packaging is local and not timed.
fn stage_histogram(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Download => Some(names::DOWNLOAD_DURATION_SECONDS),
        Stage::Extract => Some(names::EXTRACTION_DURATION_SECONDS),
        Stage::Upload => Some(names::UPLOAD_DURATION_SECONDS),
        Stage::Package => None,
    }
}

pub fn record_stage_duration(stage: Stage, duration_secs: f64) {
    if let Some(name) = stage_histogram(stage) {
        histogram!(name).record(duration_secs);
    }
}

pub fn record_catalog_upsert(status: &str) {
    counter!(names::CATALOG_UPSERTS_TOTAL, "status" => status.to_string()).increment(1);
}

/// Notification delivery attempt, by template.
pub fn record_notification(template: &str, sent: bool) {
    let name = if sent {
        names::NOTIFICATIONS_SENT_TOTAL
    } else {
        names::NOTIFICATIONS_FAILED_TOTAL
    };
    counter!(name, "template" => template.to_string()).increment(1);
}
