//! Persistence layer modules.

pub mod console_repo;
pub mod cursor_repo;
pub mod db;
pub mod record_repo;
pub mod schema;
pub mod session_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
