//! Playlist endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use mstream_common::models::{parse_id, Playlist};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::tracks::parse_json;
use crate::error::ApiResult;
use crate::store::PlaylistFilter;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct NewPlaylist {
    #[serde(default)]
    name: String,
}

/// POST /playlist
pub async fn create_playlist(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<&'static str>> {
    let request: NewPlaylist = parse_json(&body)?;
    let playlist = Playlist::new(request.name);

    state.store.insert_playlist(&playlist).await?;

    info!(playlist_id = %playlist.id, name = %playlist.name, "Playlist created");
    Ok(Json("Playlist created successfully"))
}

/// POST /playlist/:playlist_id/track/:track_id
pub async fn add_track(
    State(state): State<AppState>,
    Path(ids): Path<(String, String)>,
) -> ApiResult<Json<&'static str>> {
    let (playlist_id, track_id) = existing_track_ref(&state, ids).await?;

    state.store.push_playlist_track(playlist_id, track_id).await?;

    info!(playlist_id = %playlist_id, track_id = %track_id, "Track added to playlist");
    Ok(Json("Track successfully added to playlist"))
}

/// DELETE /playlist/:playlist_id/track/:track_id
pub async fn remove_track(
    State(state): State<AppState>,
    Path(ids): Path<(String, String)>,
) -> ApiResult<Json<&'static str>> {
    let (playlist_id, track_id) = existing_track_ref(&state, ids).await?;

    state.store.pull_playlist_track(playlist_id, track_id).await?;

    info!(playlist_id = %playlist_id, track_id = %track_id, "Track removed from playlist");
    Ok(Json("Track successfully removed from playlist"))
}

/// DELETE /playlist/:id
pub async fn delete_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<&'static str>> {
    let id = parse_id(&id)?;

    state.store.delete_playlist(id).await?;

    info!(playlist_id = %id, "Playlist deleted");
    Ok(Json("Playlist deleted successfully"))
}

/// GET /playlists
pub async fn list_playlists(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<Playlist>>> {
    let filter = PlaylistFilter::from_query(&params)?;
    let playlists = state.store.find_playlists(&filter).await?;
    Ok(Json(playlists))
}

/// Parse both path ids and make sure the track exists
async fn existing_track_ref(
    state: &AppState,
    (playlist_id, track_id): (String, String),
) -> ApiResult<(Uuid, Uuid)> {
    let playlist_id = parse_id(&playlist_id)?;
    let track_id = parse_id(&track_id)?;

    state.store.find_track(track_id).await?;

    Ok((playlist_id, track_id))
}
