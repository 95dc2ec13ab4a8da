//! Shared test doubles and request helpers for the API tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use futures::stream::{self, StreamExt};
use mstream_api::media::{
    AudioConverter, ByteStream, MediaError, MediaPipeline, MediaResult, VideoFormat, VideoInfo,
    VideoSource,
};
use mstream_api::store::{
    PlaylistFilter, Storage, StoreError, StoreResult, TrackFilter,
};
use mstream_api::{build_router, AppState, HttpLimits};
use mstream_common::auth::{AuthError, TokenValidator};
use mstream_common::models::{Playlist, Track, TrackMetadata};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const GOOD_TOKEN: &str = "good-token";
pub const BOUNDARY: &str = "mstream-test-boundary";

// =============================================================================
// Storage double
// =============================================================================

#[derive(Default)]
struct MockData {
    tracks: Vec<Track>,
    playlists: Vec<Playlist>,
    audio: HashMap<Uuid, Vec<u8>>,
}

/// In-memory `Storage` with the same semantics as the SQLite store
#[derive(Default)]
pub struct MockStore {
    data: Mutex<MockData>,
    offline: AtomicBool,
}

impl MockStore {
    /// Make `ping` fail, as if the database were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.data.lock().unwrap().tracks.clone()
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.data.lock().unwrap().playlists.clone()
    }

    pub fn audio(&self, id: Uuid) -> Option<Vec<u8>> {
        self.data.lock().unwrap().audio.get(&id).cloned()
    }

    pub fn audio_count(&self) -> usize {
        self.data.lock().unwrap().audio.len()
    }

    /// Insert a track with the given audio directly, bypassing the API
    pub fn seed_track(&self, metadata: TrackMetadata, audio: &[u8]) -> Track {
        let audio_id = Uuid::new_v4();
        let track = Track::new(metadata, audio_id);
        let mut data = self.data.lock().unwrap();
        data.audio.insert(audio_id, audio.to_vec());
        data.tracks.push(track.clone());
        track
    }

    pub fn seed_playlist(&self, name: &str, tracks: &[Uuid]) -> Playlist {
        let mut playlist = Playlist::new(name);
        playlist.tracks = tracks.to_vec();
        self.data.lock().unwrap().playlists.push(playlist.clone());
        playlist
    }
}

#[async_trait]
impl Storage for MockStore {
    async fn ping(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    async fn insert_track(&self, track: &Track) -> StoreResult<()> {
        self.data.lock().unwrap().tracks.push(track.clone());
        Ok(())
    }

    async fn find_tracks(&self, filter: &TrackFilter) -> StoreResult<Vec<Track>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .tracks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn find_track(&self, id: Uuid) -> StoreResult<Track> {
        let data = self.data.lock().unwrap();
        data.tracks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::TrackNotFound(id))
    }

    async fn update_track(&self, id: Uuid, update: &TrackMetadata) -> StoreResult<()> {
        let mut data = self.data.lock().unwrap();
        let track = data
            .tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::TrackNotFound(id))?;
        track.apply(update);
        Ok(())
    }

    async fn delete_track(&self, id: Uuid) -> StoreResult<()> {
        let mut data = self.data.lock().unwrap();
        let pos = data
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::TrackNotFound(id))?;
        let track = data.tracks.remove(pos);
        if let Some(audio_id) = track.audio_file_id {
            data.audio.remove(&audio_id);
        }
        for playlist in data.playlists.iter_mut() {
            playlist.tracks.retain(|t| *t != id);
        }
        Ok(())
    }

    async fn insert_playlist(&self, playlist: &Playlist) -> StoreResult<()> {
        self.data.lock().unwrap().playlists.push(playlist.clone());
        Ok(())
    }

    async fn find_playlists(&self, filter: &PlaylistFilter) -> StoreResult<Vec<Playlist>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .playlists
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn push_playlist_track(&self, playlist_id: Uuid, track_id: Uuid) -> StoreResult<()> {
        let mut data = self.data.lock().unwrap();
        let playlist = data
            .playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or(StoreError::PlaylistNotFound(playlist_id))?;
        if !playlist.tracks.contains(&track_id) {
            playlist.tracks.push(track_id);
        }
        Ok(())
    }

    async fn pull_playlist_track(&self, playlist_id: Uuid, track_id: Uuid) -> StoreResult<()> {
        let mut data = self.data.lock().unwrap();
        let playlist = data
            .playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or(StoreError::PlaylistNotFound(playlist_id))?;
        playlist.tracks.retain(|t| *t != track_id);
        Ok(())
    }

    async fn delete_playlist(&self, id: Uuid) -> StoreResult<()> {
        let mut data = self.data.lock().unwrap();
        let before = data.playlists.len();
        data.playlists.retain(|p| p.id != id);
        if data.playlists.len() == before {
            return Err(StoreError::NothingDeleted);
        }
        Ok(())
    }

    async fn upload_audio(&self, bytes: &[u8], _filename: &str) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.data.lock().unwrap().audio.insert(id, bytes.to_vec());
        Ok(id)
    }

    async fn download_audio(&self, id: Uuid) -> StoreResult<Vec<u8>> {
        self.audio(id).ok_or(StoreError::AudioNotFound(id))
    }
}

// =============================================================================
// Auth double
// =============================================================================

/// Accepts exactly one token
pub struct StaticValidator {
    pub accepted: String,
}

impl Default for StaticValidator {
    fn default() -> Self {
        Self {
            accepted: GOOD_TOKEN.to_string(),
        }
    }
}

#[async_trait]
impl TokenValidator for StaticValidator {
    async fn validate(&self, token: &str) -> Result<(), AuthError> {
        if token == self.accepted {
            Ok(())
        } else {
            Err(AuthError::Rejected(reqwest::StatusCode::UNAUTHORIZED))
        }
    }
}

// =============================================================================
// Media doubles
// =============================================================================

pub const FAKE_VIDEO_BYTES: &[u8] = b"fake mp4 stream";

/// Serves one video per id with an audio/mp4 and a video/mp4 format
pub struct FakeVideoSource;

#[async_trait]
impl VideoSource for FakeVideoSource {
    async fn video_info(&self, video_id: &str) -> MediaResult<VideoInfo> {
        Ok(VideoInfo {
            id: video_id.to_string(),
            title: "Fake Video".to_string(),
            author: "Fake Channel".to_string(),
            duration: 180.0,
            formats: vec![
                VideoFormat {
                    id: "18".to_string(),
                    mime_type: "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"".to_string(),
                    url: "https://media.invalid/18".to_string(),
                    bitrate: 500_000,
                },
                VideoFormat {
                    id: "140".to_string(),
                    mime_type: "audio/mp4; codecs=\"mp4a.40.2\"".to_string(),
                    url: "https://media.invalid/140".to_string(),
                    bitrate: 128_000,
                },
            ],
        })
    }

    async fn open_stream(&self, _video: &VideoInfo, format: &VideoFormat) -> MediaResult<ByteStream> {
        if format.id != "140" {
            return Err(MediaError::Source(format!("unexpected format {}", format.id)));
        }
        Ok(stream::iter(vec![Ok(FAKE_VIDEO_BYTES.to_vec())]).boxed())
    }
}

/// Prefixes the input with an ID3 tag so the output sniffs as MP3
pub struct FakeConverter;

#[async_trait]
impl AudioConverter for FakeConverter {
    async fn convert(&self, input: &Path, output: &Path) -> MediaResult<()> {
        let mut bytes = b"ID3".to_vec();
        bytes.extend(tokio::fs::read(input).await?);
        tokio::fs::write(output, bytes).await?;
        Ok(())
    }
}

/// Writes a partial output, then never finishes
pub struct StalledConverter;

#[async_trait]
impl AudioConverter for StalledConverter {
    async fn convert(&self, _input: &Path, output: &Path) -> MediaResult<()> {
        tokio::fs::write(output, b"ID3partial").await?;
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

/// Expected `/youtube/track` audio for the fake source and converter
pub fn converted_fake_audio() -> Vec<u8> {
    let mut bytes = b"ID3".to_vec();
    bytes.extend_from_slice(FAKE_VIDEO_BYTES);
    bytes
}

// =============================================================================
// App setup
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MockStore>,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MockStore::default()))
    }

    pub fn with_store(store: Arc<MockStore>) -> Self {
        Self::build(store, Arc::new(FakeConverter), HttpLimits::default())
    }

    /// App whose conversions stall past a short request timeout
    pub fn with_stalled_converter(timeout: Duration) -> Self {
        let limits = HttpLimits {
            request_timeout: timeout,
            ..HttpLimits::default()
        };
        Self::build(Arc::new(MockStore::default()), Arc::new(StalledConverter), limits)
    }

    fn build(store: Arc<MockStore>, converter: Arc<dyn AudioConverter>, limits: HttpLimits) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let media = MediaPipeline::new(Arc::new(FakeVideoSource), converter, temp_dir.path());
        let state = AppState::new(
            store.clone(),
            Arc::new(StaticValidator::default()),
            Arc::new(media),
        );

        Self {
            router: build_router(state, limits),
            store,
            temp_dir,
        }
    }

    pub fn temp_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.temp_dir.path()).unwrap().next().is_none()
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Request carrying the accepted bearer token
pub fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", GOOD_TOKEN))
}

pub fn authed_empty(method: &str, uri: &str) -> Request<Body> {
    authed(method, uri).body(Body::empty()).unwrap()
}

pub fn authed_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    authed(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// One multipart part: (field name, optional filename, content)
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn authed_multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    authed("POST", uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = body_bytes(body).await;
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
