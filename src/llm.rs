//! Model gateway abstraction and the OpenAI-compatible HTTP backend.
//!
//! [`ChatBackend`] is the seam the response generator talks to. The only
//! production implementation is [`GatewayBackend`], which calls
//! `POST {gateway}/v1/chat/completions` once per request with a bearer token.
//!
//! # Error Mapping
//!
//! | Outcome | [`ModelError`] |
//! |---------|----------------|
//! | reqwest timeout | `Timeout` |
//! | other transport failure or non-2xx status | `Unavailable` |
//! | 2xx without `choices[0].message.content` | `MalformedResponse` |
//! | anything else (e.g. undecodable body) | `Other` |
//!
//! There is no retry: the generator falls back to a local answer instead.

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;
use crate::prompt::ChatMessage;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model gateway timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("model gateway unavailable: {message}")]
    Unavailable {
        status: Option<u16>,
        message: String,
    },

    #[error("model response missing choices[0].message.content")]
    MalformedResponse,

    #[error("model call failed: {0}")]
    Other(String),
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifier sent with each request.
    fn model_name(&self) -> &str;

    /// Send `messages` and return the answer text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

/// [`ChatBackend`] for an OpenAI-compatible gateway.
pub struct GatewayBackend {
    endpoint: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    http: reqwest::Client,
}

impl GatewayBackend {
    /// Build a backend from configuration.
    ///
    /// # Errors
    ///
    /// Fails when no credential is configured or the gateway URL is invalid.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let Some(api_key) = config.credential() else {
            bail!("LLM_API_KEY is not set");
        };

        let mut endpoint = Url::parse(&config.gateway_url)?;
        if let Ok(mut path) = endpoint.path_segments_mut() {
            path.pop_if_empty().extend(["v1", "chat", "completions"]);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            endpoint,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn transport_error(&self, e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout(self.timeout)
        } else {
            ModelError::Unavailable {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ChatBackend for GatewayBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "model gateway responded");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Unavailable {
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(self.timeout)
            } else {
                ModelError::Other(e.to_string())
            }
        })?;

        extract_answer(&json).ok_or(ModelError::MalformedResponse)
    }
}

/// Pull `choices[0].message.content` out of a completion body, trimmed.
///
/// Returns `None` when the field is missing, not a string, or blank.
pub fn extract_answer(json: &serde_json::Value) -> Option<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}
