//! Deprecated ingest endpoints
//!
//! Kept for older clients: video metadata lookup, base64 audio upload and
//! track creation from a video link.

use axum::{body::Bytes, extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use mstream_common::models::TrackMetadata;
use serde::Deserialize;
use tracing::info;

use super::tracks::{parse_json, store_new_track};
use crate::error::{ApiError, ApiResult};
use crate::media::VideoInfo;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct VideoRequest {
    #[serde(default)]
    link: String,
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    #[serde(flatten)]
    metadata: TrackMetadata,
    /// Base64 encoded audio bytes
    audio: String,
}

#[derive(Debug, Deserialize)]
struct LinkTrackRequest {
    #[serde(default)]
    link: String,
    #[serde(flatten)]
    metadata: TrackMetadata,
}

/// POST /video
pub async fn get_video(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<VideoInfo>> {
    let request: VideoRequest = parse_json(&body)?;
    let video = state.media.video_info(&request.link).await?;
    Ok(Json(video))
}

/// POST /upload
pub async fn upload_audio(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<&'static str>> {
    let request: UploadRequest = parse_json(&body)?;
    let audio = STANDARD
        .decode(request.audio.as_bytes())
        .map_err(|e| ApiError::bad_request(format!("invalid base64 audio: {}", e)))?;

    store_new_track(&state, request.metadata, &audio).await?;
    Ok(Json("Track added successfully"))
}

/// POST /youtube/track
pub async fn create_track_from_link(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<&'static str>> {
    let request: LinkTrackRequest = parse_json(&body)?;

    let audio = state.media.fetch_audio(&request.link).await?;
    info!(link = %request.link, bytes = audio.len(), "Audio fetched from link");

    store_new_track(&state, request.metadata, &audio).await?;
    Ok(Json("Track added successfully"))
}
