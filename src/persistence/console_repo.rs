//! Console entry repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::record::{ConsoleEntry, ConsoleLevel};
use crate::{AppError, Result};

/// Repository wrapper around `SQLite` for normalized console entries.
#[derive(Clone)]
pub struct ConsoleRepo {
    db: Arc<SqlitePool>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ConsoleRow {
    ref_id: String,
    level: String,
    message: String,
    timestamp: String,
    location: Option<String>,
}

impl ConsoleRow {
    /// Convert a database row into the domain model.
    fn into_entry(self) -> Result<ConsoleEntry> {
        let level = ConsoleLevel::parse(&self.level)
            .ok_or_else(|| AppError::Db(format!("invalid console level: {}", self.level)))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AppError::Db(format!("invalid timestamp: {e}")))?;
        Ok(ConsoleEntry {
            ref_id: self.ref_id,
            level,
            message: self.message,
            timestamp,
            location: self.location,
        })
    }
}

impl ConsoleRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Append one console entry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn append(&self, entry: &ConsoleEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO console_logs (ref_id, level, message, timestamp, location)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&entry.ref_id)
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(entry.timestamp.to_rfc3339())
        .bind(&entry.location)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// List entries for a reference id in timestamp order, optionally
    /// filtered by level.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(
        &self,
        ref_id: &str,
        level: Option<ConsoleLevel>,
    ) -> Result<Vec<ConsoleEntry>> {
        let rows: Vec<ConsoleRow> = if let Some(level) = level {
            sqlx::query_as(
                "SELECT ref_id, level, message, timestamp, location FROM console_logs
                 WHERE ref_id = ?1 AND level = ?2 ORDER BY timestamp, id",
            )
            .bind(ref_id)
            .bind(level.as_str())
            .fetch_all(self.db.as_ref())
            .await?
        } else {
            sqlx::query_as(
                "SELECT ref_id, level, message, timestamp, location FROM console_logs
                 WHERE ref_id = ?1 ORDER BY timestamp, id",
            )
            .bind(ref_id)
            .fetch_all(self.db.as_ref())
            .await?
        };
        rows.into_iter().map(ConsoleRow::into_entry).collect()
    }
}
