//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Worker process failed to spawn.
    Launch(String),
    /// Call attempted while the worker is down or restarting.
    NotHealthy(String),
    /// Worker stream closed with no data pending — process-dead condition.
    EndOfStream,
    /// Malformed or absent reply frame from the worker.
    Protocol(String),
    /// The worker reported an error payload for a specific call.
    Remote(String),
    /// Restart attempts exceeded the policy window; operator must intervene.
    RestartExhausted(String),
    /// Requested entity does not exist.
    NotFound(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::NotHealthy(msg) => write!(f, "not healthy: {msg}"),
            Self::EndOfStream => write!(f, "end of stream"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Remote(msg) => write!(f, "remote: {msg}"),
            Self::RestartExhausted(msg) => write!(f, "restart exhausted: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Truncate an error message for size-constrained response surfaces.
///
/// Messages longer than `max_len` are cut and suffixed with an explicit
/// `"... (truncated, N total chars)"` marker; the caller is expected to
/// persist the full text separately.
#[must_use]
pub fn truncate_error(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        return message.to_owned();
    }
    // Cut on a char boundary; worker error text may contain multi-byte output.
    let mut end = max_len;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}... (truncated, {} total chars)",
        &message[..end],
        message.chars().count()
    )
}
