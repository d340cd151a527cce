//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every server startup. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// Creates all five tables and their indexes idempotently.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS sessions (
    session_id      TEXT PRIMARY KEY NOT NULL,
    created_at      TEXT NOT NULL,
    last_activity   TEXT NOT NULL,
    state           TEXT NOT NULL CHECK(state IN ('active','closed','error')),
    metadata        TEXT
);

CREATE TABLE IF NOT EXISTS requests (
    ref_id          TEXT PRIMARY KEY NOT NULL,
    session_id      TEXT NOT NULL,
    tool_name       TEXT NOT NULL,
    params          TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(session_id)
);

CREATE TABLE IF NOT EXISTS responses (
    ref_id          TEXT PRIMARY KEY NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('success','error')),
    result          TEXT,
    page_snapshot   TEXT,
    console_logs    TEXT,
    error_message   TEXT,
    timestamp       TEXT NOT NULL,
    FOREIGN KEY (ref_id) REFERENCES requests(ref_id)
);

CREATE TABLE IF NOT EXISTS console_logs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    ref_id          TEXT NOT NULL,
    level           TEXT NOT NULL CHECK(level IN ('debug','info','warn','error')),
    message         TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    location        TEXT,
    FOREIGN KEY (ref_id) REFERENCES responses(ref_id)
);

CREATE TABLE IF NOT EXISTS diff_cursors (
    ref_id          TEXT PRIMARY KEY NOT NULL,
    cursor_position INTEGER NOT NULL,
    last_snapshot_hash TEXT NOT NULL,
    last_read       TEXT NOT NULL,
    FOREIGN KEY (ref_id) REFERENCES responses(ref_id)
);

CREATE INDEX IF NOT EXISTS idx_sessions_state ON sessions(state);
CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON sessions(last_activity);
CREATE INDEX IF NOT EXISTS idx_requests_session ON requests(session_id);
CREATE INDEX IF NOT EXISTS idx_requests_tool ON requests(tool_name);
CREATE INDEX IF NOT EXISTS idx_responses_status ON responses(status);
CREATE INDEX IF NOT EXISTS idx_console_logs_ref ON console_logs(ref_id);
CREATE INDEX IF NOT EXISTS idx_console_logs_level ON console_logs(level);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
