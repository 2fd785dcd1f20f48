//! JSON envelope shared by all session responses.
//!
//! Every session endpoint answers HTTP 200 with a body carrying
//! `wrench_api_request_success`; failures additionally carry
//! `failure_cause` as a human-readable string. Handlers parse request
//! bodies themselves so that malformed JSON and missing fields come back
//! in the same envelope instead of a transport-level error.

use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

/// Key of the success flag in every session response.
pub const SUCCESS_KEY: &str = "wrench_api_request_success";

/// Build a success response, merging `extra` fields into the envelope.
pub fn api_ok(extra: Value) -> Json<Value> {
    let mut object = match extra {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            // Non-object payloads indicate a handler bug; keep the data
            // visible rather than dropping it.
            let mut map = Map::new();
            map.insert("data".to_owned(), other);
            map
        }
    };
    object.insert(SUCCESS_KEY.to_owned(), Value::Bool(true));
    Json(Value::Object(object))
}

/// Build a failure response with a cause.
pub fn api_failure(cause: impl std::fmt::Display) -> Json<Value> {
    Json(json!({
        SUCCESS_KEY: false,
        "failure_cause": cause.to_string(),
    }))
}

/// Parse a request body into a typed request.
///
/// An empty body counts as `{}` so bodiless POSTs deserialize into
/// requests whose fields are all optional.
///
/// # Errors
///
/// Returns a displayable parse message destined for `failure_cause`.
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, String> {
    let effective = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(effective).map_err(|e| format!("invalid request body: {e}"))
}
