//! Backend event entities.
//!
//! Every frame on an instance's event stream carries a `type` and a
//! kind-specific `properties` object. The session identifier lives at a
//! different depth per kind, so it is resolved once here, at parse time,
//! and every consumer reads it through [`BackendEvent::session_id`].

use serde_json::Value;

/// Kind of a message part carried by `message.part.updated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Reasoning,
    Tool,
    Other(String),
}

impl PartKind {
    fn parse(s: &str) -> Self {
        match s {
            "text" => PartKind::Text,
            "reasoning" => PartKind::Reasoning,
            "tool" | "tool-invocation" => PartKind::Tool,
            other => PartKind::Other(other.to_string()),
        }
    }
}

/// Author role of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    Other(String),
}

impl MessageRole {
    fn parse(s: &str) -> Self {
        match s {
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            other => MessageRole::Other(other.to_string()),
        }
    }
}

/// Incremental update to one part of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartUpdate {
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    pub kind: PartKind,
    pub delta: Option<String>,
}

impl PartUpdate {
    /// Non-empty delta of a text part. Reasoning and tool parts never yield text.
    pub fn text_delta(&self) -> Option<&str> {
        match (&self.kind, self.delta.as_deref()) {
            (PartKind::Text, Some(delta)) if !delta.is_empty() => Some(delta),
            _ => None,
        }
    }
}

/// Metadata update for a whole message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageUpdate {
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    pub role: MessageRole,
    pub completed: bool,
}

impl MessageUpdate {
    /// The end-of-response signal that releases buffered assistant text.
    pub fn is_assistant_completion(&self) -> bool {
        self.completed && self.role == MessageRole::Assistant
    }
}

/// Activity state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionActivity {
    Busy,
    Idle,
    Retry { attempt: u64, message: String },
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub session_id: Option<String>,
    pub activity: SessionActivity,
}

/// A tool permission the backend is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    pub session_id: Option<String>,
    pub permission_id: String,
    pub kind: String,
    pub title: String,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoItem {
    pub content: String,
    pub status: String,
    pub priority: Option<String>,
}

impl TodoItem {
    pub fn is_done(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "done" | "cancelled")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoUpdate {
    pub session_id: Option<String>,
    pub todos: Vec<TodoItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub session_id: Option<String>,
    pub name: Option<String>,
    pub message: String,
}

/// A parsed frame from an instance's event stream (tagged union).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    MessagePartUpdated(PartUpdate),
    MessageUpdated(MessageUpdate),
    SessionStatus(StatusUpdate),
    PermissionUpdated(PermissionRequest),
    TodoUpdated(TodoUpdate),
    SessionError(SessionFailure),
    /// Lifecycle frames (`server.connected`, ...) and kinds with no handler.
    Other {
        event_type: String,
        session_id: Option<String>,
    },
}

impl BackendEvent {
    /// Parse an unwrapped frame. Returns `None` when it has no `type`.
    pub fn from_frame(frame: &Value) -> Option<Self> {
        let event_type = frame.get("type").and_then(Value::as_str)?;
        let props = frame.get("properties").unwrap_or(frame);
        let session_id = resolve_session_id(props).or_else(|| resolve_session_id(frame));

        let event = match event_type {
            "message.part.updated" => {
                let part = props.get("part");
                BackendEvent::MessagePartUpdated(PartUpdate {
                    session_id,
                    message_id: part.and_then(|p| str_field(p, &["messageID", "messageId"])),
                    kind: PartKind::parse(
                        part.and_then(|p| p.get("type"))
                            .and_then(Value::as_str)
                            .unwrap_or("text"),
                    ),
                    delta: props.get("delta").and_then(Value::as_str).map(str::to_string),
                })
            }
            "message.updated" => {
                let info = props.get("info").unwrap_or(props);
                BackendEvent::MessageUpdated(MessageUpdate {
                    session_id,
                    message_id: str_field(info, &["id"]),
                    role: MessageRole::parse(
                        info.get("role").and_then(Value::as_str).unwrap_or(""),
                    ),
                    completed: info
                        .get("time")
                        .and_then(|t| t.get("completed"))
                        .is_some_and(|c| !c.is_null()),
                })
            }
            "session.status" => BackendEvent::SessionStatus(StatusUpdate {
                session_id,
                activity: parse_activity(props.get("status")),
            }),
            "permission.updated" => BackendEvent::PermissionUpdated(PermissionRequest {
                session_id,
                permission_id: str_field(props, &["id", "permissionID"]).unwrap_or_default(),
                kind: str_field(props, &["type"]).unwrap_or_else(|| "unknown".to_string()),
                title: str_field(props, &["title"]).unwrap_or_default(),
                pattern: parse_pattern(props.get("pattern")),
            }),
            "todo.updated" => BackendEvent::TodoUpdated(TodoUpdate {
                session_id,
                todos: props
                    .get("todos")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().filter_map(parse_todo).collect())
                    .unwrap_or_default(),
            }),
            "session.error" => {
                let (name, message) = parse_error(props.get("error"));
                BackendEvent::SessionError(SessionFailure {
                    session_id,
                    name,
                    message,
                })
            }
            other => BackendEvent::Other {
                event_type: other.to_string(),
                session_id,
            },
        };
        Some(event)
    }

    /// Wire name of this event's kind.
    pub fn event_type(&self) -> &str {
        match self {
            BackendEvent::MessagePartUpdated(_) => "message.part.updated",
            BackendEvent::MessageUpdated(_) => "message.updated",
            BackendEvent::SessionStatus(_) => "session.status",
            BackendEvent::PermissionUpdated(_) => "permission.updated",
            BackendEvent::TodoUpdated(_) => "todo.updated",
            BackendEvent::SessionError(_) => "session.error",
            BackendEvent::Other { event_type, .. } => event_type,
        }
    }

    /// Session this event belongs to, if the frame named one.
    pub fn session_id(&self) -> Option<&str> {
        let id = match self {
            BackendEvent::MessagePartUpdated(e) => &e.session_id,
            BackendEvent::MessageUpdated(e) => &e.session_id,
            BackendEvent::SessionStatus(e) => &e.session_id,
            BackendEvent::PermissionUpdated(e) => &e.session_id,
            BackendEvent::TodoUpdated(e) => &e.session_id,
            BackendEvent::SessionError(e) => &e.session_id,
            BackendEvent::Other { session_id, .. } => session_id,
        };
        id.as_deref()
    }
}

const SESSION_KEYS: &[&str] = &["sessionID", "sessionId"];

/// Probe top-level, then `info`, then `part` for a session identifier.
fn resolve_session_id(value: &Value) -> Option<String> {
    str_field(value, SESSION_KEYS)
        .or_else(|| value.get("info").and_then(|v| str_field(v, SESSION_KEYS)))
        .or_else(|| value.get("part").and_then(|v| str_field(v, SESSION_KEYS)))
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_activity(status: Option<&Value>) -> SessionActivity {
    let Some(status) = status else {
        return SessionActivity::Other(String::new());
    };
    let kind = status
        .as_str()
        .or_else(|| status.get("type").and_then(Value::as_str))
        .unwrap_or("");
    match kind {
        "busy" => SessionActivity::Busy,
        "idle" => SessionActivity::Idle,
        "retry" => SessionActivity::Retry {
            attempt: status.get("attempt").and_then(Value::as_u64).unwrap_or(0),
            message: status
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        },
        other => SessionActivity::Other(other.to_string()),
    }
}

fn parse_pattern(pattern: Option<&Value>) -> Option<String> {
    match pattern? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn parse_todo(item: &Value) -> Option<TodoItem> {
    Some(TodoItem {
        content: item.get("content").and_then(Value::as_str)?.to_string(),
        status: item
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("pending")
            .to_string(),
        priority: item
            .get("priority")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Error payloads come either as a bare string or as `{ name, data: { message } }`.
fn parse_error(error: Option<&Value>) -> (Option<String>, String) {
    match error {
        Some(Value::String(s)) => (None, s.clone()),
        Some(obj) if obj.is_object() => {
            let name = obj.get("name").and_then(Value::as_str).map(str::to_string);
            let message = obj
                .get("data")
                .and_then(|d| d.get("message"))
                .or_else(|| obj.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| name.clone())
                .unwrap_or_else(|| "Unknown error".to_string());
            (name, message)
        }
        _ => (None, "Unknown error".to_string()),
    }
}
