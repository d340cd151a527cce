//! HTTP route layer: axum router and shared application state.

pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::bridge::Bridge;
use crate::config::Config;
use crate::content::ContentStore;
use crate::persistence::session_repo::SessionRepo;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    /// Global configuration.
    pub config: Arc<Config>,
    /// Worker bridge; its healthy flag backs the readiness probe.
    pub bridge: Arc<Bridge>,
    /// Artifact store and diff engine.
    pub store: ContentStore,
    /// Session repository.
    pub sessions: SessionRepo,
}

/// Build the relay's router over the given state.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/sessions", post(routes::create_session))
        .route("/proxy", post(routes::invoke))
        .route("/content/{ref_id}", get(routes::get_content))
        .route("/console/{ref_id}", get(routes::get_console))
        .with_state(state)
}
