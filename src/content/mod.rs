//! Content-addressed artifact storage and diff-by-hash delivery.

pub mod diff;
pub mod store;

pub use diff::{DiffEngine, ReadOptions};
pub use store::ContentStore;
