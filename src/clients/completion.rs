//! Completion provider clients.
//!
//! Two wire formats are supported: OpenAI-style `/chat/completions` and the
//! Ollama `/api/chat` endpoint. Neither streams.

use crate::error::CompletionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Message in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Model, role-tagged messages and sampling options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the generated text for a single request.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

fn build_http(base_url: &str, timeout_seconds: u64) -> Result<reqwest::Client, CompletionError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| CompletionError::Transport {
            url: base_url.to_string(),
            reason: e.to_string(),
        })
}

fn map_send_error(e: reqwest::Error, url: &str, timeout_seconds: u64) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout(timeout_seconds)
    } else {
        CompletionError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CompletionError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(CompletionError::Status { status, body })
}

/// OpenAI chat completions API request.
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout_seconds: u64,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self, CompletionError> {
        Ok(Self {
            http: build_http(base_url, timeout_seconds)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_seconds,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAiRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            "Sending completion request ({} messages) to {}",
            request.messages.len(),
            url
        );

        let mut builder = self.http.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, self.timeout_seconds))?;
        let response = check_status(response).await?;

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(CompletionError::Empty)
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Client for a local Ollama server.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, CompletionError> {
        Ok(Self {
            http: build_http(base_url, timeout_seconds)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        debug!("Sending chat request with {} messages", request.messages.len());

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, self.timeout_seconds))?;
        let response = check_status(response).await?;

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        Ok(chat.message.content.trim().to_string())
    }
}

/// Answers every request locally with a short description of the prompt.
#[derive(Debug, Default)]
pub struct EchoCompletion;

#[async_trait]
impl CompletionClient for EchoCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        info!("[dry-run] completion request for model {}", request.model);
        Ok(format!(
            "[dry-run] {} would answer a {}-character prompt.",
            request.model, chars
        ))
    }
}
