//! Domain model types persisted by the relay.

pub mod record;
pub mod session;

pub use record::{ConsoleEntry, ConsoleLevel, DiffCursor, RequestRecord, ResponseRecord};
pub use session::{Session, SessionState};
