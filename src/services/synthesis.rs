//! Text-to-speech via the Deepgram speak API

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{BreakerState, CircuitBreaker, Synthesizer, endpoint};
use crate::config::ServicesConfig;
use crate::error::Service;
use crate::{Error, Result};

/// Synthesizes speech from text with a Deepgram Aura voice
pub struct DeepgramSynthesizer {
    client: reqwest::Client,
    api_key: SecretString,
    url: String,
    voice: String,
    breaker: CircuitBreaker,
}

impl DeepgramSynthesizer {
    /// Create a new synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(config: &ServicesConfig, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Deepgram API key required for TTS".to_string()));
        }

        Ok(Self {
            client: super::http_client(config)?,
            api_key,
            url: endpoint(&config.synthesis_url, "/v1/speak"),
            voice: config.tts_voice.clone(),
            breaker: CircuitBreaker::new(Service::Synthesis, config.breaker),
        })
    }
}

#[async_trait]
impl Synthesizer for DeepgramSynthesizer {
    /// Returns audio bytes (MP3 for Aura voices)
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeakRequest<'a> {
            text: &'a str,
        }

        let call = self.breaker.admit()?;
        tracing::debug!(voice = %self.voice, chars = text.len(), "starting synthesis");

        let response = self
            .client
            .post(&self.url)
            .query(&[("model", self.voice.as_str())])
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .json(&SpeakRequest { text })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "synthesis request failed");
                call.failure();
                Error::upstream(Service::Synthesis, e.to_string())
            })?;

        if !response.status().is_success() {
            call.failure();
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "synthesis API error");
            return Err(Error::upstream(
                Service::Synthesis,
                format!("status {status}"),
            ));
        }

        let audio = response.bytes().await.map_err(|e| {
            call.failure();
            Error::upstream(Service::Synthesis, e.to_string())
        })?;
        call.success();

        if audio.is_empty() {
            return Err(Error::EmptyResult(Service::Synthesis));
        }

        tracing::info!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }

    fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }
}
