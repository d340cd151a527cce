//! Newline-delimited JSON-RPC plumbing for the worker's stdio channel.

pub mod channel;
pub mod client;

pub use channel::{FramedChannel, WorkerChannel};
