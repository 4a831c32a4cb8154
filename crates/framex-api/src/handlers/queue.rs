//! Queue status handlers.

use axum::extract::{Path, State};
use axum::Json;
use framex_models::{QueuePosition, QueueStatus, VideoId};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::StatusState;

/// Current queue length and jobs in flight.
pub async fn queue_status(State(state): State<StatusState>) -> ApiResult<Json<QueueStatus>> {
    let status = state.projector.queue_status().await?;
    metrics::set_queue_length(state.projector.intake_queue(), status.queue_length);
    Ok(Json(status))
}

/// Estimated position of a video in the intake queue.
pub async fn queue_position(
    State(state): State<StatusState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<QueuePosition>> {
    let video_id = VideoId::from_string(video_id);
    if video_id.is_empty() {
        return Err(ApiError::bad_request("video id is required"));
    }
    Ok(Json(state.projector.position(&video_id).await?))
}
