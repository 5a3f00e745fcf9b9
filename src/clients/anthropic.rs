//! Anthropic Messages API 클라이언트.
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::util::{
    error::{UpstreamStatusError, is_retryable},
    retry::RetryConfig,
};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One single-turn completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: 50,
            temperature: 0.3,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Text completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: Url,
    api_key: String,
    retry: RetryConfig,
}

impl AnthropicClient {
    /// # Errors
    /// HTTP 클라이언트 생성이나 base URL 파싱에 실패하면 에러를 반환한다.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build anthropic client")?;
        let base_url = Url::parse(&base_url.into()).context("invalid anthropic base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            retry,
        })
    }

    async fn send_once(&self, url: &Url, request: &CompletionRequest) -> Result<String> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(url.clone())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamStatusError::new("anthropic", status, &text).into());
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("failed to deserialize anthropic response")?;
        parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| anyhow!("anthropic response has no text content"))
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let url = self
            .base_url
            .join("v1/messages")
            .context("failed to build anthropic messages URL")?;

        let mut attempt = 0;
        loop {
            match self.send_once(&url, &request).await {
                Ok(text) => {
                    debug!(model = %request.model, attempt, chars = text.chars().count(), "completion received");
                    return Ok(text);
                }
                Err(error) if is_retryable(&error) && self.retry.can_retry(attempt + 1) => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        model = %request.model,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "anthropic request failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(error) => return Err(error.context("anthropic completion failed")),
            }
        }
    }
}
