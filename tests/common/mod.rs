//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use maitre::config::ServicesConfig;
use maitre::db::{self, ConversationRepo};
use maitre::services::{BreakerConfig, DeepgramSynthesizer, DeepgramTranscriber, GroqCompleter};
use maitre::{ConversationStore, DbPool, VoiceOrchestrator};

pub const DEEPGRAM_KEY: &str = "dg-test-key";
pub const GROQ_KEY: &str = "gq-test-key";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Fake Deepgram and Groq endpoints
pub struct Upstreams {
    pub deepgram: MockServer,
    pub groq: MockServer,
}

impl Upstreams {
    pub async fn start() -> Self {
        Self {
            deepgram: MockServer::start().await,
            groq: MockServer::start().await,
        }
    }

    /// Service settings pointing at the fake endpoints
    pub fn services_config(&self) -> ServicesConfig {
        ServicesConfig {
            transcription_url: self.deepgram.uri(),
            completion_url: self.groq.uri(),
            synthesis_url: self.deepgram.uri(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            breaker: BreakerConfig {
                failure_threshold: 5,
                cooldown: Duration::from_secs(30),
            },
            ..ServicesConfig::default()
        }
    }

    /// Orchestrator wired to the fake endpoints and `store`
    pub fn orchestrator(&self, store: Arc<dyn ConversationStore>) -> VoiceOrchestrator {
        let config = self.services_config();
        VoiceOrchestrator::new(
            Arc::new(DeepgramTranscriber::new(&config, deepgram_key()).unwrap()),
            Arc::new(GroqCompleter::new(&config, groq_key()).unwrap()),
            Arc::new(DeepgramSynthesizer::new(&config, deepgram_key()).unwrap()),
            store,
        )
    }

    /// Mount a transcript response
    pub async fn transcript(&self, transcript: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/listen"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {
                    "channels": [{ "alternatives": [{ "transcript": transcript }] }]
                }
            })))
            .mount(&self.deepgram)
            .await;
    }

    /// Mount a chat completion response
    pub async fn completion(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            })))
            .mount(&self.groq)
            .await;
    }

    /// Mount a synthesis response of `len` bytes
    pub async fn speech(&self, len: usize) {
        Mock::given(method("POST"))
            .and(path("/v1/speak"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/mpeg")
                    .set_body_bytes(vec![0xAB; len]),
            )
            .mount(&self.deepgram)
            .await;
    }

    /// Mount the full book-a-table exchange
    pub async fn book_a_table(&self) {
        self.transcript("Book a table for two").await;
        self.completion("Sure, what time?").await;
        self.speech(512).await;
    }

    /// Requests received by the completion endpoint
    pub async fn completion_requests(&self) -> usize {
        self.groq
            .received_requests()
            .await
            .map_or(0, |r| r.len())
    }
}

pub fn deepgram_key() -> SecretString {
    SecretString::from(DEEPGRAM_KEY.to_string())
}

pub fn groq_key() -> SecretString {
    SecretString::from(GROQ_KEY.to_string())
}

/// Orchestrator over an in-memory store, plus a handle on that store
pub fn orchestrator_with_repo(upstreams: &Upstreams) -> (VoiceOrchestrator, ConversationRepo) {
    let repo = ConversationRepo::new(setup_test_db());
    let orchestrator = upstreams.orchestrator(Arc::new(repo.clone()));
    (orchestrator, repo)
}

/// A tiny valid WAV recording
pub fn sample_wav() -> Vec<u8> {
    maitre::voice::samples_to_wav(&[0.0, 0.1, -0.1, 0.2], 16000).unwrap()
}
