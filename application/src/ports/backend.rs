//! Backend client port
//!
//! One [`BackendClient`] exists per registered instance; it is bound to the
//! instance's base URL and working directory, so callers never pass either.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a request against a backend instance.
///
/// Always returned to the immediate caller; the caller decides how to word
/// it for a user.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// A session as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSession {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub directory: Option<String>,
}

/// A model a provider offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A configured model provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Models keyed by id, as the backend reports them.
    #[serde(default)]
    pub models: std::collections::BTreeMap<String, ModelInfo>,
}

/// Gateway to one backend instance's request/response API.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Base URL this client talks to.
    fn base_url(&self) -> &str;

    /// Working tree this client scopes every request to.
    fn directory(&self) -> &Path;

    /// Lightweight probe confirming the API accepts requests.
    async fn health(&self) -> Result<(), BackendError>;

    async fn list_sessions(&self) -> Result<Vec<BackendSession>, BackendError>;

    async fn create_session(&self, title: Option<&str>) -> Result<BackendSession, BackendError>;

    async fn get_session(&self, session_id: &str) -> Result<BackendSession, BackendError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), BackendError>;

    /// Submit a text prompt. The response text arrives on the event stream.
    async fn send_prompt(&self, session_id: &str, text: &str) -> Result<(), BackendError>;

    /// Prior messages, uninterpreted.
    async fn messages(&self, session_id: &str) -> Result<Vec<serde_json::Value>, BackendError>;

    /// Request cancellation of in-flight work.
    async fn abort(&self, session_id: &str) -> Result<(), BackendError>;

    async fn providers(&self) -> Result<Vec<ProviderInfo>, BackendError>;

    /// Select the active model.
    async fn select_model(&self, provider_id: &str, model_id: &str) -> Result<(), BackendError>;
}

/// Builds the client for an instance at `base_url` serving `directory`.
pub trait BackendConnector: Send + Sync {
    fn connect(
        &self,
        base_url: &str,
        directory: &Path,
    ) -> Result<Arc<dyn BackendClient>, BackendError>;
}
