//! Speech-to-text via the Deepgram listen API

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{BreakerState, CircuitBreaker, Transcriber, endpoint};
use crate::config::ServicesConfig;
use crate::error::Service;
use crate::{Error, Result};

/// Response from Deepgram transcription API
///
/// Every level is optional so that shape drift surfaces as an empty result
/// rather than a parse failure.
#[derive(Debug, Default, Deserialize)]
struct DeepgramResponse {
    #[serde(default)]
    results: Option<DeepgramResults>,
}

#[derive(Debug, Default, Deserialize)]
struct DeepgramResults {
    #[serde(default)]
    channels: Vec<DeepgramChannel>,
}

#[derive(Debug, Default, Deserialize)]
struct DeepgramChannel {
    #[serde(default)]
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Default, Deserialize)]
struct DeepgramAlternative {
    #[serde(default)]
    transcript: Option<String>,
}

impl DeepgramResponse {
    /// `results.channels[0].alternatives[0].transcript`, trimmed, if non-empty
    fn transcript(self) -> Option<String> {
        self.results?
            .channels
            .into_iter()
            .next()?
            .alternatives
            .into_iter()
            .next()?
            .transcript
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Transcribes speech to text with Deepgram
pub struct DeepgramTranscriber {
    client: reqwest::Client,
    api_key: SecretString,
    url: String,
    model: String,
    breaker: CircuitBreaker,
}

impl DeepgramTranscriber {
    /// Create a new transcriber
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(config: &ServicesConfig, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Deepgram API key required".to_string()));
        }

        Ok(Self {
            client: super::http_client(config)?,
            api_key,
            url: endpoint(&config.transcription_url, "/v1/listen"),
            model: config.stt_model.clone(),
            breaker: CircuitBreaker::new(Service::Transcription, config.breaker),
        })
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let call = self.breaker.admit()?;
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let response = self
            .client
            .post(&self.url)
            .query(&[("model", self.model.as_str()), ("punctuate", "true")])
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                call.failure();
                Error::upstream(Service::Transcription, e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            call.failure();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::upstream(
                Service::Transcription,
                format!("status {status}"),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            call.failure();
            Error::upstream(Service::Transcription, e.to_string())
        })?;
        call.success();

        let parsed: DeepgramResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            Error::upstream(Service::Transcription, format!("malformed response: {e}"))
        })?;

        let transcript = parsed
            .transcript()
            .ok_or(Error::EmptyResult(Service::Transcription))?;

        tracing::info!(chars = transcript.len(), "transcription complete");
        Ok(transcript)
    }

    fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }
}
