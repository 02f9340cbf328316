//! Chat completion via Groq's OpenAI-compatible API

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{BreakerState, CircuitBreaker, Completer, endpoint};
use crate::config::ServicesConfig;
use crate::error::Service;
use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    /// `choices[0].message.content`, trimmed, if non-empty
    fn content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()?
            .message?
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }
}

/// Generates assistant replies with a Groq-hosted model
pub struct GroqCompleter {
    client: reqwest::Client,
    api_key: SecretString,
    url: String,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    breaker: CircuitBreaker,
}

impl GroqCompleter {
    /// Create a new completer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(config: &ServicesConfig, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Groq API key required".to_string()));
        }

        Ok(Self {
            client: super::http_client(config)?,
            api_key,
            url: endpoint(&config.completion_url, "/v1/chat/completions"),
            model: config.llm_model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            breaker: CircuitBreaker::new(Service::Completion, config.breaker),
        })
    }
}

#[async_trait]
impl Completer for GroqCompleter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let call = self.breaker.admit()?;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "requesting completion");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "completion request failed");
                call.failure();
                Error::upstream(Service::Completion, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            call.failure();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::upstream(
                Service::Completion,
                format!("status {status}"),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            call.failure();
            Error::upstream(Service::Completion, e.to_string())
        })?;
        call.success();

        let parsed: ChatResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(error = %e, "failed to parse completion response");
            Error::upstream(Service::Completion, format!("malformed response: {e}"))
        })?;

        let content = parsed
            .content()
            .ok_or(Error::EmptyResult(Service::Completion))?;

        tracing::info!(chars = content.len(), "completion received");
        Ok(content)
    }

    fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }
}
