//! Browser session model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session accepts tool invocations.
    Active,
    /// Session was closed by the caller.
    Closed,
    /// A tool invocation against this session failed.
    Error,
}

impl SessionState {
    /// Wire/database string for this state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

/// One browser session as stored in the `sessions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session UUID.
    pub session_id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last tool-invocation timestamp.
    pub last_activity: DateTime<Utc>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Optional caller-supplied metadata as a JSON string.
    pub metadata: Option<String>,
}

impl Session {
    /// Build a fresh active session with the given id.
    #[must_use]
    pub fn new_active(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            created_at: now,
            last_activity: now,
            state: SessionState::Active,
            metadata: None,
        }
    }
}
