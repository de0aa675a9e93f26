//! HTTP client for one OpenCode instance.

use super::protocol::{
    CreateSessionRequest, DIRECTORY_PARAM, PromptRequest, ProvidersResponse, SelectModelRequest,
};
use async_trait::async_trait;
use herd_application::{
    BackendClient, BackendConnector, BackendError, BackendSession, ProviderInfo,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Upper bound of a health probe, independent of the request timeout.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// [`BackendClient`] over the OpenCode HTTP API.
///
/// Every request carries the instance's working directory as the
/// `directory` query parameter.
pub struct OpenCodeClient {
    http: reqwest::Client,
    base_url: String,
    directory: PathBuf,
    request_timeout: Duration,
}

impl OpenCodeClient {
    pub fn new(
        base_url: impl Into<String>,
        directory: impl Into<PathBuf>,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        // No client-wide timeout: prompt submission may legitimately run as
        // long as the model does.
        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            directory: directory.into(),
            request_timeout,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        trace!("{} {}", method, url);
        self.http
            .request(method, url)
            .query(&[(DIRECTORY_PARAM, self.directory.to_string_lossy())])
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!("Request to {} failed ({}): {}", url, status, body);
        Err(BackendError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            BackendError::Decode(format!(
                "{}. Body: {}",
                e,
                herd_domain::truncate(&body, 200)
            ))
        })
    }
}

#[async_trait]
impl BackendClient for OpenCodeClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn directory(&self) -> &Path {
        &self.directory
    }

    async fn health(&self) -> Result<(), BackendError> {
        self.send(self.request(Method::GET, "/session").timeout(HEALTH_TIMEOUT))
            .await
            .map(|_| ())
    }

    async fn list_sessions(&self) -> Result<Vec<BackendSession>, BackendError> {
        let response = self
            .send(self.request(Method::GET, "/session").timeout(self.request_timeout))
            .await?;
        Self::json(response).await
    }

    async fn create_session(&self, title: Option<&str>) -> Result<BackendSession, BackendError> {
        let response = self
            .send(
                self.request(Method::POST, "/session")
                    .timeout(self.request_timeout)
                    .json(&CreateSessionRequest { title }),
            )
            .await?;
        Self::json(response).await
    }

    async fn get_session(&self, session_id: &str) -> Result<BackendSession, BackendError> {
        let path = format!("/session/{session_id}");
        let response = self
            .send(self.request(Method::GET, &path).timeout(self.request_timeout))
            .await?;
        Self::json(response).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), BackendError> {
        let path = format!("/session/{session_id}");
        self.send(self.request(Method::DELETE, &path).timeout(self.request_timeout))
            .await
            .map(|_| ())
    }

    async fn send_prompt(&self, session_id: &str, text: &str) -> Result<(), BackendError> {
        let path = format!("/session/{session_id}/message");
        self.send(self.request(Method::POST, &path).json(&PromptRequest::text(text)))
            .await
            .map(|_| ())
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<serde_json::Value>, BackendError> {
        let path = format!("/session/{session_id}/message");
        let response = self
            .send(self.request(Method::GET, &path).timeout(self.request_timeout))
            .await?;
        Self::json(response).await
    }

    async fn abort(&self, session_id: &str) -> Result<(), BackendError> {
        let path = format!("/session/{session_id}/abort");
        self.send(self.request(Method::POST, &path).timeout(self.request_timeout))
            .await
            .map(|_| ())
    }

    async fn providers(&self) -> Result<Vec<ProviderInfo>, BackendError> {
        let response = self
            .send(self.request(Method::GET, "/provider").timeout(self.request_timeout))
            .await?;
        let providers: ProvidersResponse = Self::json(response).await?;
        Ok(providers.all)
    }

    async fn select_model(&self, provider_id: &str, model_id: &str) -> Result<(), BackendError> {
        self.send(
            self.request(Method::POST, "/provider")
                .timeout(self.request_timeout)
                .json(&SelectModelRequest {
                    provider_id,
                    model_id,
                }),
        )
        .await
        .map(|_| ())
    }
}

/// Builds an [`OpenCodeClient`] per instance.
pub struct OpenCodeConnector {
    request_timeout: Duration,
}

impl OpenCodeConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl BackendConnector for OpenCodeConnector {
    fn connect(
        &self,
        base_url: &str,
        directory: &Path,
    ) -> Result<Arc<dyn BackendClient>, BackendError> {
        Ok(Arc::new(OpenCodeClient::new(
            base_url,
            directory,
            self.request_timeout,
        )?))
    }
}
