#![forbid(unsafe_code)]

//! `browser-relay` — HTTP relay for a Playwright MCP worker process.
//!
//! Supervises a long-lived browser-control worker speaking newline-delimited
//! JSON-RPC over stdio, persists its oversized results as content-addressed
//! artifacts, and serves them back incrementally so size-budgeted callers
//! never receive raw payloads inline.

pub mod bridge;
pub mod config;
pub mod content;
pub mod errors;
pub mod http;
pub mod models;
pub mod persistence;
pub mod rpc;

pub use config::Config;
pub use errors::{AppError, Result};
