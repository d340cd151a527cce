//! Request/response artifacts, console entries, and diff cursors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tool invocation as recorded in the `requests` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Opaque reference id minted for this invocation.
    pub ref_id: String,
    /// Owning session UUID.
    pub session_id: String,
    /// Worker tool name (e.g. `browser_snapshot`).
    pub tool_name: String,
    /// Tool parameters as a JSON string.
    pub params: String,
    /// Invocation timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Stored outcome of a tool invocation, keyed by reference id.
///
/// The oversized fields (`page_snapshot`, `console_logs`) are the artifact
/// blobs served back incrementally through the diff engine; `result` holds
/// only minimal metadata, never the raw worker payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Reference id (same as the originating request).
    pub ref_id: String,
    /// `true` when the invocation succeeded.
    pub success: bool,
    /// Minimal result metadata as a JSON string.
    pub result: Option<String>,
    /// Full-page text dump, when the invoked tool produced one.
    pub page_snapshot: Option<String>,
    /// Raw console text blob, when the invoked tool produced one.
    pub console_logs: Option<String>,
    /// Full error text for failed invocations (untruncated).
    pub error_message: Option<String>,
    /// Completion timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Severity of a single console entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleLevel {
    /// Verbose diagnostics.
    Debug,
    /// Informational output.
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

impl ConsoleLevel {
    /// Wire/database string for this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parse a level string, case-insensitively. Unknown strings map to
    /// `None` so callers can fall back to defaults.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" | "log" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One normalized console message associated with a reference id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Reference id this entry belongs to.
    pub ref_id: String,
    /// Severity.
    pub level: ConsoleLevel,
    /// Message text.
    pub message: String,
    /// Entry timestamp.
    pub timestamp: DateTime<Utc>,
    /// Optional source location as a JSON string `{url, lineNumber, …}`.
    pub location: Option<String>,
}

/// Per-reference diff state: hash and length of the last delivered content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffCursor {
    /// Reference id this cursor tracks. A cursor never exists without a
    /// corresponding response record.
    pub ref_id: String,
    /// Byte length of the content last delivered.
    pub cursor_position: i64,
    /// SHA-256 hex of the content last delivered.
    pub last_snapshot_hash: String,
    /// Timestamp of the last read.
    pub last_read: DateTime<Utc>,
}
