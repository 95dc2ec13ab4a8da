//! Track and playlist data model

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TRACK_NAME: &str = "Unknown";
pub const DEFAULT_ARTIST: &str = "Unknown Artist";
pub const DEFAULT_ALBUM: &str = "Unknown Album";

/// A single audio item with metadata and a reference to its stored bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub name: String,
    pub artist: String,
    #[serde(rename = "album")]
    pub album_name: String,
    #[serde(rename = "audioFile", skip_serializing_if = "Option::is_none")]
    pub audio_file_id: Option<Uuid>,
}

impl Track {
    /// Build a new track from client metadata, substituting defaults for
    /// empty fields
    pub fn new(metadata: TrackMetadata, audio_file_id: Uuid) -> Self {
        let metadata = metadata.with_defaults();
        Self {
            id: Uuid::new_v4(),
            name: metadata.name,
            artist: metadata.artist,
            album_name: metadata.album,
            audio_file_id: Some(audio_file_id),
        }
    }

    /// Overwrite fields that are non-empty in `update`
    pub fn apply(&mut self, update: &TrackMetadata) {
        if !update.name.is_empty() {
            self.name = update.name.clone();
        }
        if !update.artist.is_empty() {
            self.artist = update.artist.clone();
        }
        if !update.album.is_empty() {
            self.album_name = update.album.clone();
        }
    }
}

/// Client-supplied track metadata
///
/// Used both for creation (where empty fields get defaults) and for partial
/// updates (where empty fields are left untouched).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackMetadata {
    pub name: String,
    pub artist: String,
    pub album: String,
}

impl TrackMetadata {
    pub fn with_defaults(mut self) -> Self {
        if self.name.is_empty() {
            self.name = DEFAULT_TRACK_NAME.to_string();
        }
        if self.artist.is_empty() {
            self.artist = DEFAULT_ARTIST.to_string();
        }
        if self.album.is_empty() {
            self.album = DEFAULT_ALBUM.to_string();
        }
        self
    }
}

/// A named collection of track references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<Uuid>,
}

impl Playlist {
    /// Playlists are always created empty
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tracks: Vec::new(),
        }
    }
}

/// Parse an entity id taken from a path or query parameter
pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::InvalidInput(format!("invalid id '{}': {}", raw, e)))
}
