//! Cohere v1 chat client.

use crate::error::ChatError;
use crate::ndjson::decode_events;
use crate::service::{ChatService, EventStream};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use voxline_types::{ChatReply, ChatRequest};

/// Longest error body kept in a [`ChatError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

fn default_base_url() -> String {
    "https://api.cohere.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Connection settings for the hosted Cohere API.
#[derive(Clone, Serialize, Deserialize)]
pub struct CohereConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Upper bound on one outbound request, streamed body included.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for CohereConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl fmt::Debug for CohereConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohereConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl CohereConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Joins `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Builds the shared HTTP client used for hosted-API calls.
///
/// Callers still set the timeout on each request, so the deadline holds
/// when the builder fails and the default client is used instead.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("voxline/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "http client builder failed, using defaults with per-request timeouts"
            );
            reqwest::Client::new()
        }
    }
}

/// Turns a non-success response into [`ChatError::Status`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

#[derive(Debug, Deserialize)]
struct WireReply {
    text: String,
}

/// [`ChatService`] backed by `POST /v1/chat`.
#[derive(Debug, Clone)]
pub struct CohereChatClient {
    config: CohereConfig,
    http: reqwest::Client,
}

impl CohereChatClient {
    pub fn new(config: CohereConfig) -> Self {
        let http = build_http_client(config.timeout());
        Self { config, http }
    }

    async fn post(&self, request: &ChatRequest) -> Result<reqwest::Response, ChatError> {
        let url = self.config.endpoint("/v1/chat");
        tracing::debug!(
            url = %url,
            model = request.model.as_ref().map(|m| m.as_str()).unwrap_or("<default>"),
            stream = request.stream,
            message_chars = request.message.chars().count(),
            "sending chat request"
        );

        let response = self
            .http
            .post(&url)
            .timeout(self.config.timeout())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;
        check_status(response).await
    }
}

#[async_trait]
impl ChatService for CohereChatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        let request = request.clone().streaming(false);
        let response = self.post(&request).await?;
        let body = response.bytes().await?;
        let reply: WireReply = serde_json::from_slice(&body)?;
        Ok(ChatReply::new(reply.text))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<EventStream, ChatError> {
        let request = request.clone().streaming(true);
        let response = self.post(&request).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ChatError::from))
            .boxed();
        Ok(decode_events(bytes))
    }
}
