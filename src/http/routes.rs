//! Route handlers for the relay's HTTP surface.
//!
//! The `/proxy` endpoint is the only writer: it funnels tool invocations
//! through the bridge and persists oversized results as artifacts. Callers
//! receive metadata plus a reference id, never the raw payload inline;
//! `/content` and `/console` serve the stored blobs back incrementally.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::content::store::parse_console_blob;
use crate::content::ReadOptions;
use crate::errors::truncate_error;
use crate::models::record::{ConsoleLevel, RequestRecord, ResponseRecord};
use crate::models::session::{Session, SessionState};
use crate::AppError;

use super::AppState;

/// Maximum error-text length returned over the size-constrained surface.
const MAX_ERROR_CHARS: usize = 500;

/// Error payload for non-2xx replies.
type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, detail: &str) -> ApiError {
    (status, Json(json!({ "detail": detail })))
}

fn internal_error(err: &AppError) -> ApiError {
    error!(%err, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
}

// ── /health ──────────────────────────────────────────────────────────────────

/// Readiness probe backed by the bridge's healthy flag.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let healthy = state.bridge.is_healthy();
    Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "worker": if healthy { "running" } else { "down" },
    }))
}

// ── /sessions ────────────────────────────────────────────────────────────────

/// Create a new browser session.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let session = Session::new_active(Uuid::new_v4().to_string());
    state
        .sessions
        .create(&session)
        .await
        .map_err(|e| internal_error(&e))?;

    info!(session_id = %session.session_id, "session created");
    Ok(Json(json!({ "session_id": session.session_id })))
}

// ── /proxy ───────────────────────────────────────────────────────────────────

/// Body of a tool invocation request.
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    /// Target session UUID.
    pub session_id: String,
    /// Worker tool name.
    pub tool: String,
    /// Tool parameters.
    #[serde(default)]
    pub params: Value,
    /// Optional caller-supplied reference id.
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Metadata describing what an invocation produced.
#[derive(Debug, Serialize)]
pub struct InvokeMetadata {
    /// Tool that was called.
    pub tool: String,
    /// Whether a page snapshot artifact was stored.
    pub has_snapshot: bool,
    /// Whether console output was stored.
    pub has_console_logs: bool,
    /// Number of error-level console entries.
    pub console_error_count: usize,
}

/// Reply to a tool invocation: metadata plus the reference id only.
#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    /// Reference id for later content reads.
    pub ref_id: String,
    /// Session the call ran against.
    pub session_id: String,
    /// `"success"` or `"error"`.
    pub status: String,
    /// Completion timestamp.
    pub timestamp: DateTime<Utc>,
    /// What the invocation produced.
    pub metadata: InvokeMetadata,
    /// Truncated error text when status is `"error"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Invoke a worker tool and persist its oversized output as an artifact.
pub async fn invoke(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, ApiError> {
    let session = state
        .sessions
        .get(&request.session_id)
        .await
        .map_err(|e| internal_error(&e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))?;

    if session.state != SessionState::Active {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            &format!("Session is {}", session.state.as_str()),
        ));
    }

    let ref_id = request
        .request_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let record = RequestRecord {
        ref_id: ref_id.clone(),
        session_id: request.session_id.clone(),
        tool_name: request.tool.clone(),
        params: request.params.to_string(),
        timestamp: Utc::now(),
    };
    state
        .store
        .record_request(&record)
        .await
        .map_err(|e| internal_error(&e))?;
    state
        .sessions
        .touch_activity(&request.session_id)
        .await
        .map_err(|e| internal_error(&e))?;

    let call_params = json!({ "name": request.tool, "arguments": request.params });
    match state.bridge.call("tools/call", &call_params).await {
        Ok(result) => {
            let reply = persist_success(&state, &request, ref_id, &result)
                .await
                .map_err(|e| internal_error(&e))?;
            Ok(Json(reply))
        }
        Err(err) => {
            let reply = persist_failure(&state, &request, ref_id, &err)
                .await
                .map_err(|e| internal_error(&e))?;
            Ok(Json(reply))
        }
    }
}

/// Extract `result.content[0].text` — the shape worker tools use for their
/// primary text payload.
fn first_content_text(result: &Value) -> Option<String> {
    result
        .get("content")?
        .get(0)?
        .get("text")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

async fn persist_success(
    state: &AppState,
    request: &InvokeRequest,
    ref_id: String,
    result: &Value,
) -> crate::Result<InvokeResponse> {
    // Only the tools that produce oversized text dumps yield artifacts.
    let page_snapshot = (request.tool == "browser_snapshot")
        .then(|| first_content_text(result))
        .flatten();
    let console_logs = (request.tool == "browser_console_messages")
        .then(|| first_content_text(result))
        .flatten();

    let console_error_count = console_logs.as_deref().map_or(0, |blob| {
        parse_console_blob(&ref_id, blob)
            .iter()
            .filter(|e| e.level == ConsoleLevel::Error)
            .count()
    });

    // Store minimal metadata, never the raw worker payload.
    let result_metadata = json!({
        "tool": request.tool,
        "isError": result.get("isError").and_then(Value::as_bool).unwrap_or(false),
    });

    let metadata = InvokeMetadata {
        tool: request.tool.clone(),
        has_snapshot: page_snapshot.is_some(),
        has_console_logs: console_logs.is_some(),
        console_error_count,
    };

    let response = ResponseRecord {
        ref_id: ref_id.clone(),
        success: true,
        result: Some(result_metadata.to_string()),
        page_snapshot,
        console_logs,
        error_message: None,
        timestamp: Utc::now(),
    };
    state.store.store_outcome(&response).await?;

    Ok(InvokeResponse {
        ref_id,
        session_id: request.session_id.clone(),
        status: "success".into(),
        timestamp: response.timestamp,
        metadata,
        error: None,
    })
}

async fn persist_failure(
    state: &AppState,
    request: &InvokeRequest,
    ref_id: String,
    err: &AppError,
) -> crate::Result<InvokeResponse> {
    let full_error = err.to_string();
    error!(ref_id, error = %truncate_error(&full_error, MAX_ERROR_CHARS), "invoke failed");

    // The full error is durable; only the HTTP reply is truncated.
    let response = ResponseRecord {
        ref_id: ref_id.clone(),
        success: false,
        result: None,
        page_snapshot: None,
        console_logs: None,
        error_message: Some(full_error.clone()),
        timestamp: Utc::now(),
    };
    state.store.store_outcome(&response).await?;
    state
        .sessions
        .set_state(&request.session_id, SessionState::Error)
        .await?;

    Ok(InvokeResponse {
        ref_id,
        session_id: request.session_id.clone(),
        status: "error".into(),
        timestamp: response.timestamp,
        metadata: InvokeMetadata {
            tool: request.tool.clone(),
            has_snapshot: false,
            has_console_logs: false,
            console_error_count: 0,
        },
        error: Some(truncate_error(&full_error, MAX_ERROR_CHARS)),
    })
}

// ── /content/{ref_id} ────────────────────────────────────────────────────────

/// Query parameters for a content read.
#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    /// Substring filter.
    #[serde(default)]
    pub search_for: Option<String>,
    /// Reset the diff cursor and return full content.
    #[serde(default)]
    pub reset_cursor: bool,
    /// Context lines before each match.
    #[serde(default)]
    pub before_lines: usize,
    /// Context lines after each match.
    #[serde(default)]
    pub after_lines: usize,
}

/// Read snapshot content with diff-by-hash and optional context search.
pub async fn get_content(
    State(state): State<AppState>,
    Path(ref_id): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Value>, ApiError> {
    let options = ReadOptions {
        search: query.search_for,
        before: query.before_lines,
        after: query.after_lines,
        reset: query.reset_cursor,
    };

    match state.store.read_content(&ref_id, &options).await {
        Ok(content) => Ok(Json(json!({ "content": content }))),
        Err(AppError::NotFound(_)) => {
            Err(api_error(StatusCode::NOT_FOUND, "Response not found"))
        }
        Err(err) => Err(internal_error(&err)),
    }
}

// ── /console/{ref_id} ────────────────────────────────────────────────────────

/// Query parameters for a console read.
#[derive(Debug, Default, Deserialize)]
pub struct ConsoleQuery {
    /// Optional level filter (`debug`, `info`, `warn`, `error`).
    #[serde(default)]
    pub level: Option<String>,
}

/// Read console output for a reference id.
pub async fn get_console(
    State(state): State<AppState>,
    Path(ref_id): Path<String>,
    Query(query): Query<ConsoleQuery>,
) -> Result<Json<Value>, ApiError> {
    // An unrecognized level string disables the filter rather than erroring.
    let level = query.level.as_deref().and_then(ConsoleLevel::parse);

    match state.store.read_console(&ref_id, level).await {
        Ok(content) => Ok(Json(json!({ "content": content }))),
        Err(AppError::NotFound(_)) => {
            Err(api_error(StatusCode::NOT_FOUND, "Response not found"))
        }
        Err(err) => Err(internal_error(&err)),
    }
}
