//! HTTP API handlers for mstream-api

pub mod auth;
pub mod health;
pub mod ingest;
pub mod playlists;
pub mod tracks;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use ingest::{create_track_from_link, get_video, upload_audio};
pub use playlists::{add_track, create_playlist, delete_playlist, list_playlists, remove_track};
pub use tracks::{create_track, delete_track, get_track_audio, list_tracks, update_track};
