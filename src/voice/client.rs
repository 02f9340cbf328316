//! HTTP client for the orchestrator endpoint

use async_trait::async_trait;
use serde::Deserialize;

use super::VoiceClient;
use crate::config::RecorderConfig;
use crate::error::Service;
use crate::protocol::{VoiceReply, VoiceRequest};
use crate::{Error, Result};

/// Submits recordings to a running orchestrator
pub struct OrchestratorClient {
    client: reqwest::Client,
    endpoint: String,
}

/// Reply body as received; either field may be missing on failure
#[derive(Debug, Deserialize)]
struct RawReply {
    text: Option<String>,
    audio: Option<Vec<u8>>,
    error: Option<String>,
}

impl OrchestratorClient {
    /// Create a client for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &RecorderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("maitre/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Endpoint requests are sent to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VoiceClient for OrchestratorClient {
    async fn submit(&self, request: &VoiceRequest) -> Result<VoiceReply> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::upstream(Service::Orchestrator, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::upstream(Service::Orchestrator, e.to_string()))?;
        let raw: Option<RawReply> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = raw
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("request failed with status {status}"));
            tracing::warn!(status = %status, error = %message, "orchestrator returned an error");
            return Err(Error::upstream(Service::Orchestrator, message));
        }

        let raw = raw.ok_or_else(|| {
            Error::upstream(Service::Orchestrator, "response body is not valid JSON")
        })?;

        match raw.audio {
            Some(audio) if !audio.is_empty() => {
                tracing::debug!(audio_bytes = audio.len(), "reply received");
                Ok(VoiceReply {
                    text: raw.text.unwrap_or_default(),
                    audio,
                })
            }
            _ => Err(Error::EmptyResult(Service::Orchestrator)),
        }
    }
}
