//! Content store: durable artifacts keyed by opaque reference ids.
//!
//! The invoke path never returns oversized worker output inline. Snapshot
//! and console blobs are persisted here under a freshly minted reference id;
//! callers get back metadata plus the id and fetch the content later through
//! the diff engine, filtered or suppressed as appropriate.

use chrono::Utc;

use crate::models::record::{ConsoleEntry, ConsoleLevel, RequestRecord, ResponseRecord};
use crate::persistence::console_repo::ConsoleRepo;
use crate::persistence::record_repo::RecordRepo;
use crate::{AppError, Result};

use super::diff::{DiffEngine, ReadOptions};

/// Facade over the artifact repositories and the diff engine.
#[derive(Clone)]
pub struct ContentStore {
    records: RecordRepo,
    console: ConsoleRepo,
    diff: DiffEngine,
}

impl ContentStore {
    /// Create a content store over the given repositories.
    #[must_use]
    pub fn new(records: RecordRepo, console: ConsoleRepo, diff: DiffEngine) -> Self {
        Self {
            records,
            console,
            diff,
        }
    }

    /// Record an inbound tool invocation under its reference id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn record_request(&self, request: &RequestRecord) -> Result<()> {
        self.records.create_request(request).await
    }

    /// Persist an invocation outcome: the response record plus any console
    /// entries parsed out of the raw blob.
    ///
    /// No size limit applies here — size budgets exist only on the RPC
    /// response surface, never on stored content.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any insert fails. Console entries are
    /// appended after the response row so a cursor can never reference a
    /// missing artifact.
    pub async fn store_outcome(&self, response: &ResponseRecord) -> Result<()> {
        self.records.create_response(response).await?;

        if let Some(blob) = &response.console_logs {
            for entry in parse_console_blob(&response.ref_id, blob) {
                self.console.append(&entry).await?;
            }
        }
        Ok(())
    }

    /// Read snapshot content for a reference id with diff semantics.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown reference id.
    pub async fn read_content(&self, ref_id: &str, options: &ReadOptions) -> Result<String> {
        self.diff.read(ref_id, options).await
    }

    /// Read console output for a reference id, optionally filtered by level.
    ///
    /// Normalized entries are preferred and formatted one per line as
    /// `[LEVEL] <rfc3339>: <message>`; when none exist the raw stored blob
    /// is returned as-is, and an artifact without console output reads as
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown reference id.
    pub async fn read_console(&self, ref_id: &str, level: Option<ConsoleLevel>) -> Result<String> {
        let response = self
            .records
            .get_response(ref_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no response for ref {ref_id}")))?;

        let entries = self.console.list(ref_id, level).await?;
        if !entries.is_empty() {
            let formatted: Vec<String> = entries
                .iter()
                .map(|e| {
                    format!(
                        "[{}] {}: {}",
                        e.level.as_str().to_uppercase(),
                        e.timestamp.to_rfc3339(),
                        e.message
                    )
                })
                .collect();
            return Ok(formatted.join("\n"));
        }

        Ok(response.console_logs.unwrap_or_default())
    }
}

/// Parse a raw console text blob into normalized entries.
///
/// The worker reports console messages as lines shaped like
/// `[LEVEL] message text`. Lines that do not carry a recognizable level
/// prefix are skipped; the raw blob remains available as the fallback.
#[must_use]
pub fn parse_console_blob(ref_id: &str, blob: &str) -> Vec<ConsoleEntry> {
    let now = Utc::now();
    blob.lines()
        .filter_map(|line| {
            let rest = line.strip_prefix('[')?;
            let (level_str, message) = rest.split_once(']')?;
            let level = ConsoleLevel::parse(level_str.trim())?;
            Some(ConsoleEntry {
                ref_id: ref_id.to_owned(),
                level,
                message: message.trim_start().to_owned(),
                timestamp: now,
                location: None,
            })
        })
        .collect()
}
