//! Chunked binary-object store for audio bytes
//!
//! An object is one `audio_files` row (filename, total length, chunk size)
//! plus `audio_chunks` rows numbered from 0. Reading concatenates the
//! chunks in order and checks that none are missing.

use super::{StoreError, StoreResult};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Chunk size in bytes (255 KiB)
pub const CHUNK_SIZE: usize = 255 * 1024;

/// Write a new object; caller owns the transaction
pub(super) async fn write_object(
    conn: &mut SqliteConnection,
    id: Uuid,
    bytes: &[u8],
    filename: &str,
) -> StoreResult<()> {
    let result = sqlx::query(
        "INSERT INTO audio_files (id, filename, length, chunk_size, upload_date) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(filename)
    .bind(bytes.len() as i64)
    .bind(CHUNK_SIZE as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotInserted("audio file"));
    }

    for (n, chunk) in bytes.chunks(CHUNK_SIZE).enumerate() {
        sqlx::query("INSERT INTO audio_chunks (files_id, n, data) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(n as i64)
            .bind(chunk)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Read an object back into one buffer
pub(super) async fn read_object(pool: &SqlitePool, id: Uuid) -> StoreResult<Vec<u8>> {
    let (length,): (i64,) = sqlx::query_as("SELECT length FROM audio_files WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::AudioNotFound(id))?;

    let chunks: Vec<(i64, Vec<u8>)> =
        sqlx::query_as("SELECT n, data FROM audio_chunks WHERE files_id = ? ORDER BY n")
            .bind(id.to_string())
            .fetch_all(pool)
            .await?;

    let mut buf = Vec::with_capacity(length.max(0) as usize);
    for (expected, (n, data)) in chunks.into_iter().enumerate() {
        if n != expected as i64 {
            return Err(StoreError::Corrupt(format!(
                "audio file {} is missing chunk {}",
                id, expected
            )));
        }
        buf.extend_from_slice(&data);
    }

    if buf.len() as i64 != length {
        return Err(StoreError::Corrupt(format!(
            "audio file {} has {} bytes, expected {}",
            id,
            buf.len(),
            length
        )));
    }

    Ok(buf)
}

/// Delete an object's chunks and metadata row
pub(super) async fn delete_object(conn: &mut SqliteConnection, id: &str) -> StoreResult<()> {
    sqlx::query("DELETE FROM audio_chunks WHERE files_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM audio_files WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
