//! OpenCode wire types.
//!
//! Request bodies for the HTTP API and the payload of event stream frames.

use herd_application::ProviderInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query parameter scoping every request to one working tree.
pub const DIRECTORY_PARAM: &str = "directory";

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct PromptPart<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PromptRequest<'a> {
    pub parts: Vec<PromptPart<'a>>,
}

impl<'a> PromptRequest<'a> {
    pub fn text(text: &'a str) -> Self {
        Self {
            parts: vec![PromptPart { kind: "text", text }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SelectModelRequest<'a> {
    #[serde(rename = "providerID")]
    pub provider_id: &'a str,
    #[serde(rename = "modelID")]
    pub model_id: &'a str,
}

/// `GET /provider` wraps the list: `{ "all": [...] }`.
#[derive(Debug, Deserialize)]
pub struct ProvidersResponse {
    #[serde(default)]
    pub all: Vec<ProviderInfo>,
}

/// Parse the `data` field of one event stream frame.
///
/// Keepalives with empty data and payloads that are not JSON yield `None`.
pub fn parse_frame(data: &str) -> Option<Value> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    serde_json::from_str(data).ok().map(unwrap_envelope)
}

/// Unwrap `{ directory, payload }` to `payload`; anything else is returned as is.
///
/// The frame sent right after connecting carries no envelope.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("payload").is_some_and(Value::is_object) => {
            map.remove("payload").unwrap_or(Value::Null)
        }
        other => other,
    }
}
