//! JSON-RPC 2.0 request construction and reply decoding.
//!
//! The wire format is newline-delimited JSON-RPC 2.0 over the worker's
//! stdio. Requests carry a monotonically incrementing integer id assigned by
//! the bridge; replies are decoded without id correlation because the bridge
//! serialises calls single-flight on the channel.

use serde_json::{json, Map, Value};

use crate::{AppError, Result};

/// Build one outbound JSON-RPC 2.0 request envelope.
#[must_use]
pub fn build_request(id: u64, method: &str, params: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Decode one reply frame into its `result` value.
///
/// Decision table:
/// - not valid JSON → [`AppError::Protocol`];
/// - valid JSON lacking both `result` and `error` → [`AppError::Protocol`];
/// - `error` field present → [`AppError::Remote`] carrying the payload;
/// - otherwise the `result` value, defaulting to `{}` when absent but an
///   `error: null` style envelope named it.
///
/// # Errors
///
/// See the decision table above.
pub fn parse_reply(frame: &[u8]) -> Result<Value> {
    let reply: Value = serde_json::from_slice(frame)
        .map_err(|e| AppError::Protocol(format!("reply is not valid JSON: {e}")))?;

    let Value::Object(mut fields) = reply else {
        return Err(AppError::Protocol("reply is not a JSON object".into()));
    };

    if let Some(error) = fields.get("error").filter(|e| !e.is_null()) {
        return Err(AppError::Remote(error.to_string()));
    }

    let has_error_key = fields.contains_key("error");
    match fields.remove("result") {
        Some(result) => Ok(result),
        // `error: null` counts as an (empty) success envelope.
        None if has_error_key => Ok(Value::Object(Map::new())),
        None => Err(AppError::Protocol(
            "reply lacks both `result` and `error`".into(),
        )),
    }
}
