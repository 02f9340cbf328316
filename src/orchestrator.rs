//! Voice request orchestration
//!
//! One request runs strictly in sequence:
//!
//! ```text
//! audioData ─► decode ─► transcribe ─► complete ─► synthesize ─► persist ─► reply
//! ```
//!
//! Any failure stops the pipeline; nothing after the failing step runs, so
//! a record is only written after synthesis has succeeded.

use std::sync::Arc;

use crate::config::{Config, PersistencePolicy};
use crate::db::{self, ConversationRecord, ConversationStore};
use crate::error::Service;
use crate::protocol::{VoiceReply, VoiceRequest};
use crate::services::{
    BreakerState, Completer, DeepgramSynthesizer, DeepgramTranscriber, GroqCompleter,
    Synthesizer, Transcriber,
};
use crate::Result;

/// Sequences transcription, completion, synthesis and persistence
pub struct VoiceOrchestrator {
    transcriber: Arc<dyn Transcriber>,
    completer: Arc<dyn Completer>,
    synthesizer: Arc<dyn Synthesizer>,
    store: Arc<dyn ConversationStore>,
    policy: PersistencePolicy,
}

impl VoiceOrchestrator {
    /// Create an orchestrator from its collaborators
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        completer: Arc<dyn Completer>,
        synthesizer: Arc<dyn Synthesizer>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            transcriber,
            completer,
            synthesizer,
            store,
            policy: PersistencePolicy::default(),
        }
    }

    /// Set how store failures are treated
    #[must_use]
    pub const fn persistence_policy(mut self, policy: PersistencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the production orchestrator from configuration
    ///
    /// # Errors
    ///
    /// Returns error if a service client or the store cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let transcriber = DeepgramTranscriber::new(&config.services, config.deepgram_key())?;
        let completer = GroqCompleter::new(&config.services, config.groq_key())?;
        let synthesizer = DeepgramSynthesizer::new(&config.services, config.deepgram_key())?;
        let store = db::open_store(&config.store)?;

        Ok(Self::new(
            Arc::new(transcriber),
            Arc::new(completer),
            Arc::new(synthesizer),
            store,
        )
        .persistence_policy(config.store.policy))
    }

    /// Handle one voice request end to end
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if the request carries no decodable audio
    /// - `Error::Upstream`, `Error::EmptyResult` or `Error::CircuitOpen` from the services
    /// - `Error::Persistence` if the record cannot be written under the fatal policy
    pub async fn process(&self, request: &VoiceRequest) -> Result<VoiceReply> {
        let audio = request.decode_audio()?;
        tracing::debug!(audio_bytes = audio.len(), "processing voice request");

        let transcript = self.transcriber.transcribe(&audio).await?;
        let reply_text = self.completer.complete(&transcript).await?;
        let reply_audio = self.synthesizer.synthesize(&reply_text).await?;

        let record = ConversationRecord {
            user_input: transcript,
            ai_response: reply_text,
        };

        if let Err(e) = self.store.append(&record).await {
            match self.policy {
                PersistencePolicy::Fatal => return Err(e),
                PersistencePolicy::BestEffort => {
                    tracing::warn!(error = %e, "failed to store conversation, replying anyway");
                }
            }
        }

        tracing::info!(
            transcript_chars = record.user_input.len(),
            reply_chars = record.ai_response.len(),
            audio_bytes = reply_audio.len(),
            "voice request complete"
        );

        Ok(VoiceReply {
            text: record.ai_response,
            audio: reply_audio,
        })
    }

    /// Probe the conversation store
    ///
    /// # Errors
    ///
    /// Returns `Error::Persistence` if the store is unreachable
    pub async fn probe_store(&self) -> Result<()> {
        self.store.probe().await
    }

    /// Backend name of the conversation store
    #[must_use]
    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Breaker state of each upstream service
    #[must_use]
    pub fn upstream_states(&self) -> [(Service, BreakerState); 3] {
        [
            (Service::Transcription, self.transcriber.breaker_state()),
            (Service::Completion, self.completer.breaker_state()),
            (Service::Synthesis, self.synthesizer.breaker_state()),
        ]
    }
}

impl std::fmt::Debug for VoiceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceOrchestrator")
            .field("store", &self.store.backend())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
