//! SQLite implementation of the storage client

use super::{
    audio, PlaylistField, PlaylistFilter, Storage, StoreError, StoreResult, TrackFilter,
};
use async_trait::async_trait;
use mstream_common::models::{Playlist, Track, TrackMetadata};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

type TrackRow = (String, String, String, String, Option<String>);

/// Storage client backed by a sqlx SQLite pool
///
/// The pool is safe for concurrent use; clone freely.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> StoreResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT track_id FROM playlist_tracks WHERE playlist_id = ? ORDER BY rowid",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|(id,)| decode_id(id)).collect()
    }

    async fn ensure_playlist_exists(&self, playlist_id: Uuid) -> StoreResult<()> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM playlists WHERE id = ?")
            .bind(playlist_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        found
            .map(|_| ())
            .ok_or(StoreError::PlaylistNotFound(playlist_id))
    }
}

fn decode_id(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad id '{}': {}", raw, e)))
}

fn track_from_row((id, name, artist, album, audio_file_id): TrackRow) -> StoreResult<Track> {
    Ok(Track {
        id: decode_id(&id)?,
        name,
        artist,
        album_name: album,
        audio_file_id: audio_file_id.as_deref().map(decode_id).transpose()?,
    })
}

#[async_trait]
impl Storage for SqliteStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_track(&self, track: &Track) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO tracks (id, name, artist, album, audio_file_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(track.id.to_string())
        .bind(&track.name)
        .bind(&track.artist)
        .bind(&track.album_name)
        .bind(track.audio_file_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotInserted("tracks"));
        }

        debug!(track_id = %track.id, name = %track.name, "Track inserted");
        Ok(())
    }

    async fn find_tracks(&self, filter: &TrackFilter) -> StoreResult<Vec<Track>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, artist, album, audio_file_id FROM tracks",
        );
        for (i, (field, value)) in filter.conditions.iter().enumerate() {
            query.push(if i == 0 { " WHERE " } else { " AND " });
            query.push(field.column());
            query.push(" = ");
            query.push_bind(value.clone());
        }
        query.push(" ORDER BY rowid");

        let rows: Vec<TrackRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(track_from_row).collect()
    }

    async fn find_track(&self, id: Uuid) -> StoreResult<Track> {
        let row: Option<TrackRow> = sqlx::query_as(
            "SELECT id, name, artist, album, audio_file_id FROM tracks WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(track_from_row)
            .transpose()?
            .ok_or(StoreError::TrackNotFound(id))
    }

    async fn update_track(&self, id: Uuid, update: &TrackMetadata) -> StoreResult<()> {
        let mut track = self.find_track(id).await?;
        track.apply(update);

        let result = sqlx::query("UPDATE tracks SET name = ?, artist = ?, album = ? WHERE id = ?")
            .bind(&track.name)
            .bind(&track.artist)
            .bind(&track.album_name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TrackNotFound(id));
        }

        debug!(track_id = %id, "Track updated");
        Ok(())
    }

    async fn delete_track(&self, id: Uuid) -> StoreResult<()> {
        // Track row, audio object and playlist references go together.
        // The first statement writes: a transaction that reads first cannot
        // take the write lock once another connection has committed.
        let mut tx = self.pool.begin().await?;

        let (audio_file_id,): (Option<String>,) =
            sqlx::query_as("DELETE FROM tracks WHERE id = ? RETURNING audio_file_id")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::TrackNotFound(id))?;

        if let Some(audio_id) = audio_file_id.as_deref() {
            audio::delete_object(&mut tx, audio_id).await?;
        }

        let pulled = sqlx::query("DELETE FROM playlist_tracks WHERE track_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(
            track_id = %id,
            playlists_updated = pulled,
            "Track deleted with audio and playlist references"
        );
        Ok(())
    }

    async fn insert_playlist(&self, playlist: &Playlist) -> StoreResult<()> {
        let result = sqlx::query("INSERT INTO playlists (id, name) VALUES (?, ?)")
            .bind(playlist.id.to_string())
            .bind(&playlist.name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotInserted("playlist"));
        }

        debug!(playlist_id = %playlist.id, name = %playlist.name, "Playlist inserted");
        Ok(())
    }

    async fn find_playlists(&self, filter: &PlaylistFilter) -> StoreResult<Vec<Playlist>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT id, name FROM playlists");
        for (i, (field, value)) in filter.conditions.iter().enumerate() {
            query.push(if i == 0 { " WHERE " } else { " AND " });
            match field {
                PlaylistField::Id => {
                    query.push("id = ");
                }
                PlaylistField::Name => {
                    query.push("name = ");
                }
                PlaylistField::Track => {
                    query.push("id IN (SELECT playlist_id FROM playlist_tracks WHERE track_id = ");
                }
            }
            query.push_bind(value.clone());
            if *field == PlaylistField::Track {
                query.push(")");
            }
        }
        query.push(" ORDER BY rowid");

        let rows: Vec<(String, String)> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut playlists = Vec::with_capacity(rows.len());
        for (id, name) in rows {
            let tracks = self.playlist_tracks(&id).await?;
            playlists.push(Playlist {
                id: decode_id(&id)?,
                name,
                tracks,
            });
        }
        Ok(playlists)
    }

    async fn push_playlist_track(&self, playlist_id: Uuid, track_id: Uuid) -> StoreResult<()> {
        self.ensure_playlist_exists(playlist_id).await?;

        sqlx::query("INSERT OR IGNORE INTO playlist_tracks (playlist_id, track_id) VALUES (?, ?)")
            .bind(playlist_id.to_string())
            .bind(track_id.to_string())
            .execute(&self.pool)
            .await?;

        debug!(playlist_id = %playlist_id, track_id = %track_id, "Track pushed to playlist");
        Ok(())
    }

    async fn pull_playlist_track(&self, playlist_id: Uuid, track_id: Uuid) -> StoreResult<()> {
        self.ensure_playlist_exists(playlist_id).await?;

        sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = ? AND track_id = ?")
            .bind(playlist_id.to_string())
            .bind(track_id.to_string())
            .execute(&self.pool)
            .await?;

        debug!(playlist_id = %playlist_id, track_id = %track_id, "Track pulled from playlist");
        Ok(())
    }

    async fn delete_playlist(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls back
            return Err(StoreError::NothingDeleted);
        }

        tx.commit().await?;
        debug!(playlist_id = %id, "Playlist deleted");
        Ok(())
    }

    async fn upload_audio(&self, bytes: &[u8], filename: &str) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;
        audio::write_object(&mut tx, id, bytes, filename).await?;
        tx.commit().await?;

        debug!(audio_id = %id, bytes = bytes.len(), filename, "Audio object stored");
        Ok(id)
    }

    async fn download_audio(&self, id: Uuid) -> StoreResult<Vec<u8>> {
        audio::read_object(&self.pool, id).await
    }
}
