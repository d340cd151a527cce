//! Diff cursor repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::record::DiffCursor;
use crate::{AppError, Result};

/// Repository wrapper around `SQLite` for per-reference diff cursors.
#[derive(Clone)]
pub struct CursorRepo {
    db: Arc<SqlitePool>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct CursorRow {
    ref_id: String,
    cursor_position: i64,
    last_snapshot_hash: String,
    last_read: String,
}

impl CursorRow {
    /// Convert a database row into the domain model.
    fn into_cursor(self) -> Result<DiffCursor> {
        let last_read = DateTime::parse_from_rfc3339(&self.last_read)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AppError::Db(format!("invalid last_read: {e}")))?;
        Ok(DiffCursor {
            ref_id: self.ref_id,
            cursor_position: self.cursor_position,
            last_snapshot_hash: self.last_snapshot_hash,
            last_read,
        })
    }
}

impl CursorRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Retrieve the cursor for a reference id, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, ref_id: &str) -> Result<Option<DiffCursor>> {
        let row: Option<CursorRow> =
            sqlx::query_as("SELECT * FROM diff_cursors WHERE ref_id = ?1")
                .bind(ref_id)
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(CursorRow::into_cursor).transpose()
    }

    /// Create or replace the cursor for a reference id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn upsert(&self, cursor: &DiffCursor) -> Result<()> {
        sqlx::query(
            "INSERT INTO diff_cursors (ref_id, cursor_position, last_snapshot_hash, last_read)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(ref_id) DO UPDATE SET
                 cursor_position = excluded.cursor_position,
                 last_snapshot_hash = excluded.last_snapshot_hash,
                 last_read = excluded.last_read",
        )
        .bind(&cursor.ref_id)
        .bind(cursor.cursor_position)
        .bind(&cursor.last_snapshot_hash)
        .bind(cursor.last_read.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Delete the cursor for a reference id, if present.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, ref_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM diff_cursors WHERE ref_id = ?1")
            .bind(ref_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }
}
