//! Request/response record repository for `SQLite` persistence.
//!
//! Responses are the durable artifacts of the content store: the oversized
//! snapshot and console blobs live here, retrievable only by reference id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::record::{RequestRecord, ResponseRecord};
use crate::{AppError, Result};

/// Repository wrapper around `SQLite` for request/response records.
#[derive(Clone)]
pub struct RecordRepo {
    db: Arc<SqlitePool>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ResponseRow {
    ref_id: String,
    status: String,
    result: Option<String>,
    page_snapshot: Option<String>,
    console_logs: Option<String>,
    error_message: Option<String>,
    timestamp: String,
}

impl ResponseRow {
    /// Convert a database row into the domain model.
    fn into_response(self) -> Result<ResponseRecord> {
        let success = match self.status.as_str() {
            "success" => true,
            "error" => false,
            other => return Err(AppError::Db(format!("invalid response status: {other}"))),
        };
        Ok(ResponseRecord {
            ref_id: self.ref_id,
            success,
            result: self.result,
            page_snapshot: self.page_snapshot,
            console_logs: self.console_logs,
            error_message: self.error_message,
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid timestamp: {e}")))
}

impl RecordRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new request record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn create_request(&self, request: &RequestRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO requests (ref_id, session_id, tool_name, params, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&request.ref_id)
        .bind(&request.session_id)
        .bind(&request.tool_name)
        .bind(&request.params)
        .bind(request.timestamp.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Insert a new response record (the durable artifact).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn create_response(&self, response: &ResponseRecord) -> Result<()> {
        let status = if response.success { "success" } else { "error" };
        sqlx::query(
            "INSERT INTO responses (ref_id, status, result, page_snapshot, console_logs,
             error_message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&response.ref_id)
        .bind(status)
        .bind(&response.result)
        .bind(&response.page_snapshot)
        .bind(&response.console_logs)
        .bind(&response.error_message)
        .bind(response.timestamp.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Retrieve a response by reference id.
    ///
    /// Returns `Ok(None)` if no response exists for the id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_response(&self, ref_id: &str) -> Result<Option<ResponseRecord>> {
        let row: Option<ResponseRow> = sqlx::query_as("SELECT * FROM responses WHERE ref_id = ?1")
            .bind(ref_id)
            .fetch_optional(self.db.as_ref())
            .await?;
        row.map(ResponseRow::into_response).transpose()
    }
}
