//! Storage client
//!
//! `Storage` is the capability the HTTP layer depends on. `SqliteStore` is
//! the production implementation; tests substitute an in-memory double.

mod audio;
mod sqlite;

pub use audio::CHUNK_SIZE;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use mstream_common::models::{Playlist, Track, TrackMetadata};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Storage errors
///
/// Underlying database errors are surfaced verbatim.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("no track found with id {0}")]
    TrackNotFound(Uuid),

    #[error("no playlist found with id {0}")]
    PlaylistNotFound(Uuid),

    #[error("no audio file found with id {0}")]
    AudioNotFound(Uuid),

    #[error("no {0} inserted")]
    NotInserted(&'static str),

    #[error("no documents were deleted")]
    NothingDeleted,

    /// Stored data could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage operations used by the HTTP handlers
#[async_trait]
pub trait Storage: Send + Sync {
    /// Liveness check against the underlying store
    async fn ping(&self) -> StoreResult<()>;

    async fn insert_track(&self, track: &Track) -> StoreResult<()>;
    async fn find_tracks(&self, filter: &TrackFilter) -> StoreResult<Vec<Track>>;
    async fn find_track(&self, id: Uuid) -> StoreResult<Track>;
    /// Overwrite only the non-empty fields of `update`
    async fn update_track(&self, id: Uuid, update: &TrackMetadata) -> StoreResult<()>;
    /// Delete a track, its audio object and every playlist reference to it
    async fn delete_track(&self, id: Uuid) -> StoreResult<()>;

    async fn insert_playlist(&self, playlist: &Playlist) -> StoreResult<()>;
    async fn find_playlists(&self, filter: &PlaylistFilter) -> StoreResult<Vec<Playlist>>;
    /// Add a track reference (no-op if already present)
    async fn push_playlist_track(&self, playlist_id: Uuid, track_id: Uuid) -> StoreResult<()>;
    /// Remove a track reference (no-op if absent)
    async fn pull_playlist_track(&self, playlist_id: Uuid, track_id: Uuid) -> StoreResult<()>;
    async fn delete_playlist(&self, id: Uuid) -> StoreResult<()>;

    /// Store audio bytes, returning the new object id
    async fn upload_audio(&self, bytes: &[u8], filename: &str) -> StoreResult<Uuid>;
    async fn download_audio(&self, id: Uuid) -> StoreResult<Vec<u8>>;
}

// ========================================
// Filters
// ========================================

/// Rejected query filter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unsupported filter field '{0}'")]
    UnknownField(String),

    #[error("invalid id '{value}' for filter field '{field}'")]
    InvalidId { field: String, value: String },
}

/// Filterable track fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackField {
    Id,
    Name,
    Artist,
    Album,
    AudioFile,
}

impl TrackField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            TrackField::Id => "id",
            TrackField::Name => "name",
            TrackField::Artist => "artist",
            TrackField::Album => "album",
            TrackField::AudioFile => "audio_file_id",
        }
    }

    fn is_id(self) -> bool {
        matches!(self, TrackField::Id | TrackField::AudioFile)
    }
}

impl FromStr for TrackField {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" | "_id" => Ok(TrackField::Id),
            "name" => Ok(TrackField::Name),
            "artist" => Ok(TrackField::Artist),
            "album" => Ok(TrackField::Album),
            "audioFile" => Ok(TrackField::AudioFile),
            other => Err(FilterError::UnknownField(other.to_string())),
        }
    }
}

/// Exact-match track filter; an empty filter matches every track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFilter {
    pub conditions: Vec<(TrackField, String)>,
}

impl TrackFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            conditions: vec![(TrackField::Id, id.to_string())],
        }
    }

    /// Build from query-string pairs; the first value of a repeated key wins
    pub fn from_query(pairs: &[(String, String)]) -> Result<Self, FilterError> {
        let mut conditions: Vec<(TrackField, String)> = Vec::new();
        for (key, value) in pairs {
            let field: TrackField = key.parse()?;
            if conditions.iter().any(|(f, _)| *f == field) {
                continue;
            }
            let value = if field.is_id() {
                normalize_id(key, value)?
            } else {
                value.clone()
            };
            conditions.push((field, value));
        }
        Ok(Self { conditions })
    }

    pub fn matches(&self, track: &Track) -> bool {
        self.conditions.iter().all(|(field, value)| match field {
            TrackField::Id => track.id.to_string() == *value,
            TrackField::Name => track.name == *value,
            TrackField::Artist => track.artist == *value,
            TrackField::Album => track.album_name == *value,
            TrackField::AudioFile => {
                track.audio_file_id.map(|id| id.to_string()).as_deref() == Some(value.as_str())
            }
        })
    }
}

/// Filterable playlist fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistField {
    Id,
    Name,
    /// Playlist contains the given track id
    Track,
}

impl FromStr for PlaylistField {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" | "_id" => Ok(PlaylistField::Id),
            "name" => Ok(PlaylistField::Name),
            "track" | "tracks" => Ok(PlaylistField::Track),
            other => Err(FilterError::UnknownField(other.to_string())),
        }
    }
}

/// Exact-match playlist filter; an empty filter matches every playlist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistFilter {
    pub conditions: Vec<(PlaylistField, String)>,
}

impl PlaylistFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            conditions: vec![(PlaylistField::Id, id.to_string())],
        }
    }

    /// Build from query-string pairs; the first value of a repeated key wins
    pub fn from_query(pairs: &[(String, String)]) -> Result<Self, FilterError> {
        let mut conditions: Vec<(PlaylistField, String)> = Vec::new();
        for (key, value) in pairs {
            let field: PlaylistField = key.parse()?;
            if conditions.iter().any(|(f, _)| *f == field) {
                continue;
            }
            let value = match field {
                PlaylistField::Name => value.clone(),
                PlaylistField::Id | PlaylistField::Track => normalize_id(key, value)?,
            };
            conditions.push((field, value));
        }
        Ok(Self { conditions })
    }

    pub fn matches(&self, playlist: &Playlist) -> bool {
        self.conditions.iter().all(|(field, value)| match field {
            PlaylistField::Id => playlist.id.to_string() == *value,
            PlaylistField::Name => playlist.name == *value,
            PlaylistField::Track => playlist.tracks.iter().any(|t| t.to_string() == *value),
        })
    }
}

/// Id filter values are compared in canonical hyphenated form
fn normalize_id(field: &str, value: &str) -> Result<String, FilterError> {
    Uuid::parse_str(value)
        .map(|id| id.to_string())
        .map_err(|_| FilterError::InvalidId {
            field: field.to_string(),
            value: value.to_string(),
        })
}
