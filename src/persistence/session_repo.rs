//! Session repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::session::{Session, SessionState};
use crate::{AppError, Result};

/// Repository wrapper around `SQLite` for session records.
#[derive(Clone)]
pub struct SessionRepo {
    db: Arc<SqlitePool>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    created_at: String,
    last_activity: String,
    state: String,
    metadata: Option<String>,
}

impl SessionRow {
    /// Convert a database row into the domain model.
    fn into_session(self) -> Result<Session> {
        Ok(Session {
            session_id: self.session_id,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            last_activity: parse_timestamp(&self.last_activity, "last_activity")?,
            state: parse_state(&self.state)?,
            metadata: self.metadata,
        })
    }
}

fn parse_timestamp(s: &str, field: &str) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

fn parse_state(s: &str) -> Result<SessionState> {
    match s {
        "active" => Ok(SessionState::Active),
        "closed" => Ok(SessionState::Closed),
        "error" => Ok(SessionState::Error),
        other => Err(AppError::Db(format!("invalid session state: {other}"))),
    }
}

impl SessionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new session record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn create(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (session_id, created_at, last_activity, state, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&session.session_id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.last_activity.to_rfc3339())
        .bind(session.state.as_str())
        .bind(&session.metadata)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Retrieve a session by identifier.
    ///
    /// Returns `Ok(None)` if the session does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM sessions WHERE session_id = ?1")
                .bind(session_id)
                .fetch_optional(self.db.as_ref())
                .await?;
        row.map(SessionRow::into_session).transpose()
    }

    /// List sessions in the given state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_state(&self, state: SessionState) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE state = ?1 ORDER BY last_activity DESC",
        )
        .bind(state.as_str())
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }

    /// Bump a session's last-activity timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn touch_activity(&self, session_id: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_activity = ?1 WHERE session_id = ?2")
            .bind(Utc::now().to_rfc3339())
            .bind(session_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Set a session's lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn set_state(&self, session_id: &str, state: SessionState) -> Result<()> {
        sqlx::query("UPDATE sessions SET state = ?1, last_activity = ?2 WHERE session_id = ?3")
            .bind(state.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(session_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }
}
