//! Track endpoints

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use mstream_common::models::{parse_id, Track, TrackMetadata};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::store::TrackFilter;
use crate::AppState;

/// Multipart file part holding the audio bytes
const INPUT_PART: &str = "input";
/// Optional multipart text part holding the metadata JSON
const BODY_PART: &str = "body";

/// POST /track
///
/// Multipart upload: file part `input` with the audio, optional part `body`
/// with `{"name", "artist", "album"}`. Empty fields get defaults.
pub async fn create_track(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<&'static str>> {
    let mut multipart = multipart.map_err(ApiError::bad_request)?;

    let mut input: Option<Bytes> = None;
    let mut body: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await.map_err(ApiError::bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            INPUT_PART => input = Some(field.bytes().await.map_err(ApiError::bad_request)?),
            BODY_PART => body = Some(field.bytes().await.map_err(ApiError::bad_request)?),
            _ => {}
        }
    }

    let audio = input.ok_or_else(|| {
        ApiError::bad_request(format!("no file found with key '{}'", INPUT_PART))
    })?;

    let metadata = match body {
        Some(raw) if !raw.is_empty() => parse_json::<TrackMetadata>(&raw)?,
        _ => TrackMetadata::default(),
    };

    store_new_track(&state, metadata, &audio).await?;
    Ok(Json("Track added successfully"))
}

/// GET /track/:id
///
/// Streams back the stored audio bytes.
pub async fn get_track_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;

    let track = state.store.find_track(id).await?;
    let audio_id = track
        .audio_file_id
        .ok_or_else(|| ApiError::internal(format!("track {} has no audio file", id)))?;
    let bytes = state.store.download_audio(audio_id).await?;

    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// PUT /track/:id
///
/// Partial update: only non-empty fields are written.
pub async fn update_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<&'static str>> {
    let id = parse_id(&id)?;
    let update: TrackMetadata = parse_json(&body)?;

    state.store.update_track(id, &update).await?;

    info!(track_id = %id, "Track updated");
    Ok(Json("Track updated successfully"))
}

/// DELETE /track/:id
///
/// Removes the track, its audio and every playlist reference to it.
pub async fn delete_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<&'static str>> {
    let id = parse_id(&id)?;

    state.store.delete_track(id).await?;

    info!(track_id = %id, "Track deleted");
    Ok(Json("Track deleted successfully"))
}

/// GET /tracks
pub async fn list_tracks(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<Track>>> {
    let filter = TrackFilter::from_query(&params)?;
    let tracks = state.store.find_tracks(&filter).await?;
    Ok(Json(tracks))
}

/// Upload audio then record the track pointing at it
pub(crate) async fn store_new_track(
    state: &AppState,
    metadata: TrackMetadata,
    audio: &[u8],
) -> ApiResult<Track> {
    let metadata = metadata.with_defaults();

    let audio_id = state.store.upload_audio(audio, &metadata.name).await?;
    let track = Track::new(metadata, audio_id);
    state.store.insert_track(&track).await?;

    info!(
        track_id = %track.id,
        audio_id = %audio_id,
        bytes = audio.len(),
        name = %track.name,
        "Track added"
    );
    Ok(track)
}

/// Decode a JSON request body, reporting malformed input as a 400
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(raw: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(raw).map_err(ApiError::bad_request)
}
