//! Diff engine: context-aware line filtering and cursor-based change
//! suppression.
//!
//! Callers with strict per-message size budgets poll artifacts repeatedly.
//! The cursor records the hash of what was last delivered so an unchanged
//! artifact costs an empty response; a changed one is re-delivered whole
//! (the diff granularity is whole-artifact replacement, not a line patch).

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::models::record::DiffCursor;
use crate::persistence::cursor_repo::CursorRepo;
use crate::persistence::record_repo::RecordRepo;
use crate::{AppError, Result};

/// Options for one content read.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Substring filter; lines containing it are kept.
    pub search: Option<String>,
    /// Context lines to keep before each match (like `grep -B`).
    pub before: usize,
    /// Context lines to keep after each match (like `grep -A`).
    pub after: usize,
    /// Discard any existing cursor and return the content unconditionally.
    pub reset: bool,
}

/// SHA-256 hex digest of `text`.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Filter `text` to lines containing `search` plus surrounding context.
///
/// Kept indices are deduplicated and merged; output preserves original line
/// order, with a literal `--` line inserted wherever two kept regions are
/// non-adjacent. No match yields an empty string.
#[must_use]
pub fn filter_with_context(text: &str, search: &str, before: usize, after: usize) -> String {
    let all_lines: Vec<&str> = text.split('\n').collect();
    let mut keep = vec![false; all_lines.len()];

    for (i, line) in all_lines.iter().enumerate() {
        if line.contains(search) {
            let start = i.saturating_sub(before);
            let end = (i + after).min(all_lines.len().saturating_sub(1));
            for flag in &mut keep[start..=end] {
                *flag = true;
            }
        }
    }

    let mut result_lines: Vec<&str> = Vec::new();
    let mut prev_idx: Option<usize> = None;
    for (idx, line) in all_lines.iter().enumerate() {
        if !keep[idx] {
            continue;
        }
        if let Some(prev) = prev_idx {
            if idx - prev > 1 {
                result_lines.push("--");
            }
        }
        result_lines.push(line);
        prev_idx = Some(idx);
    }

    result_lines.join("\n")
}

/// Decides, per read, between full content, an empty result, and a filtered
/// excerpt, maintaining the per-reference cursor.
#[derive(Clone)]
pub struct DiffEngine {
    records: RecordRepo,
    cursors: CursorRepo,
}

impl DiffEngine {
    /// Create a diff engine over the given repositories.
    #[must_use]
    pub fn new(records: RecordRepo, cursors: CursorRepo) -> Self {
        Self { records, cursors }
    }

    /// Read the artifact stored under `ref_id`, applying filter and cursor
    /// semantics.
    ///
    /// - `reset` — drop any cursor, store a fresh one from the returned
    ///   text's hash, return the (filtered-or-full) content.
    /// - no cursor — first read, same as reset.
    /// - cursor present — compare the hash of the *unfiltered* artifact
    ///   against the stored hash: unchanged → touch `last_read` and return
    ///   empty; changed → update the cursor and return the filtered content.
    ///
    /// An artifact without a snapshot blob reads as empty without touching
    /// cursor state.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] when no response exists for `ref_id`
    /// and `AppError::Db` on persistence failures.
    pub async fn read(&self, ref_id: &str, options: &ReadOptions) -> Result<String> {
        let response = self
            .records
            .get_response(ref_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no response for ref {ref_id}")))?;

        let Some(snapshot) = response.page_snapshot else {
            return Ok(String::new());
        };

        let filtered = match &options.search {
            Some(search) if !search.is_empty() => {
                filter_with_context(&snapshot, search, options.before, options.after)
            }
            _ => snapshot.clone(),
        };

        if options.reset {
            self.cursors.delete(ref_id).await?;
            self.store_cursor(ref_id, &filtered).await?;
            return Ok(filtered);
        }

        let Some(mut cursor) = self.cursors.get(ref_id).await? else {
            // First read: deliver in full and remember what was delivered.
            self.store_cursor(ref_id, &filtered).await?;
            return Ok(filtered);
        };

        // Change detection runs on the raw artifact, independent of any
        // active filter; the filter shapes only what is returned.
        let raw_hash = content_hash(&snapshot);
        if cursor.last_snapshot_hash == raw_hash {
            cursor.last_read = Utc::now();
            self.cursors.upsert(&cursor).await?;
            return Ok(String::new());
        }

        cursor.last_snapshot_hash = raw_hash;
        cursor.cursor_position = i64::try_from(filtered.len()).unwrap_or(i64::MAX);
        cursor.last_read = Utc::now();
        self.cursors.upsert(&cursor).await?;
        Ok(filtered)
    }

    /// Store a fresh cursor reflecting the text being delivered.
    async fn store_cursor(&self, ref_id: &str, delivered: &str) -> Result<()> {
        let cursor = DiffCursor {
            ref_id: ref_id.to_owned(),
            cursor_position: i64::try_from(delivered.len()).unwrap_or(i64::MAX),
            last_snapshot_hash: content_hash(delivered),
            last_read: Utc::now(),
        };
        self.cursors.upsert(&cursor).await
    }
}
