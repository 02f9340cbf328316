//! Upstream speech and language services
//!
//! The orchestrator talks to three external APIs through the traits below.
//! Production implementations are plain REST clients over `reqwest`, each
//! guarded by its own [`CircuitBreaker`] and a bounded request timeout.

pub mod breaker;
pub mod completion;
pub mod synthesis;
pub mod transcription;

use async_trait::async_trait;

use crate::config::ServicesConfig;
use crate::{Error, Result};

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use completion::GroqCompleter;
pub use synthesis::DeepgramSynthesizer;
pub use transcription::DeepgramTranscriber;

/// Converts recorded speech to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV audio, returning non-empty trimmed text
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Breaker state, for readiness reporting
    fn breaker_state(&self) -> BreakerState {
        BreakerState::Closed
    }
}

/// Produces a reply to a user utterance
#[async_trait]
pub trait Completer: Send + Sync {
    /// Generate a reply to `prompt`, returning non-empty text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Breaker state, for readiness reporting
    fn breaker_state(&self) -> BreakerState {
        BreakerState::Closed
    }
}

/// Converts reply text to audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text`, returning encoded audio bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Breaker state, for readiness reporting
    fn breaker_state(&self) -> BreakerState {
        BreakerState::Closed
    }
}

/// Build the HTTP client shared by an upstream service
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized
pub fn http_client(config: &ServicesConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(concat!("maitre/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))
}

/// Join a base URL and an absolute API path without doubling slashes
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("https://api.deepgram.com/", "/v1/listen"),
            "https://api.deepgram.com/v1/listen"
        );
        assert_eq!(
            endpoint("http://127.0.0.1:9000", "/v1/speak"),
            "http://127.0.0.1:9000/v1/speak"
        );
    }
}
