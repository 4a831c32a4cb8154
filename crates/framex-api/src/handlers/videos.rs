//! Video catalog handlers.

use axum::extract::{Path, State};
use axum::Json;
use framex_models::{UserStats, VideoId, VideoRecord};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::Owner;
use crate::error::{ApiError, ApiResult};
use crate::state::CatalogState;

/// Response for the caller's video list.
#[derive(Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoRecord>,
    pub total: usize,
}

/// Response after deleting a video.
#[derive(Serialize)]
pub struct DeleteVideoResponse {
    pub message: String,
    pub video_id: VideoId,
}

/// Presigned download link for a frame archive.
#[derive(Serialize)]
pub struct DownloadResponse {
    pub video_id: VideoId,
    pub url: String,
    pub filename: String,
    pub expires_in: u64,
}

fn parse_video_id(raw: String) -> ApiResult<VideoId> {
    let video_id = VideoId::from_string(raw);
    if video_id.is_empty() {
        return Err(ApiError::bad_request("video id is required"));
    }
    Ok(video_id)
}

/// Look up a record the caller owns. Records of other users are reported as
/// missing so IDs cannot be enumerated.
async fn owned_record(state: &CatalogState, owner: &Owner, video_id: &VideoId) -> ApiResult<VideoRecord> {
    match state.catalog.get(video_id).await {
        Some(record) if record.user_id == owner.as_str() => Ok(record),
        _ => Err(ApiError::not_found(format!("video {}", video_id))),
    }
}

/// List the caller's videos, newest first.
pub async fn list_videos(State(state): State<CatalogState>, owner: Owner) -> Json<VideoListResponse> {
    let videos = state.catalog.list_by_owner(owner.as_str()).await;
    Json(VideoListResponse {
        total: videos.len(),
        videos,
    })
}

/// Get one of the caller's videos.
pub async fn get_video(
    State(state): State<CatalogState>,
    owner: Owner,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoRecord>> {
    let video_id = parse_video_id(video_id)?;
    Ok(Json(owned_record(&state, &owner, &video_id).await?))
}

/// Delete one of the caller's videos and its archive.
pub async fn delete_video(
    State(state): State<CatalogState>,
    owner: Owner,
    Path(video_id): Path<String>,
) -> ApiResult<Json<DeleteVideoResponse>> {
    let video_id = parse_video_id(video_id)?;
    let record = state.catalog.delete(&video_id, owner.as_str()).await?;

    if !record.zip_object_name.is_empty() {
        // The catalog entry is gone either way; a leftover archive is only logged
        if let Err(e) = state
            .store
            .delete(&state.processed_bucket, &record.zip_object_name)
            .await
        {
            warn!(video_id = %video_id, error = %e, "Failed to delete frame archive");
        }
    }

    info!(video_id = %video_id, user_id = owner.as_str(), "Video deleted");

    Ok(Json(DeleteVideoResponse {
        message: "video deleted".to_string(),
        video_id,
    }))
}

/// Aggregate counts over the caller's videos.
pub async fn get_stats(State(state): State<CatalogState>, owner: Owner) -> Json<UserStats> {
    Json(state.catalog.stats(owner.as_str()).await)
}

/// Presigned URL for the caller's frame archive.
pub async fn download_url(
    State(state): State<CatalogState>,
    owner: Owner,
    Path(video_id): Path<String>,
) -> ApiResult<Json<DownloadResponse>> {
    let video_id = parse_video_id(video_id)?;
    let record = owned_record(&state, &owner, &video_id).await?;

    if !record.is_downloadable() {
        return Err(ApiError::not_found(format!("video {} has no frame archive", video_id)));
    }

    let url = state
        .store
        .presign_get(&state.processed_bucket, &record.zip_object_name, state.presign_expiry)
        .await?;

    Ok(Json(DownloadResponse {
        video_id,
        url,
        filename: record.zip_object_name,
        expires_in: state.presign_expiry.as_secs(),
    }))
}
