//! Maitre - voice assistant for restaurant orders and reservations
//!
//! A caller speaks into the recorder; the orchestrator turns the recording
//! into a spoken reply and keeps a record of the exchange.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   POST { audioData }    ┌───────────────────────────┐
//! │       Recorder       │ ──────────────────────► │     Voice Orchestrator    │
//! │  mic → WAV → base64  │ ◄────────────────────── │                           │
//! │  play reply audio    │    { text, audio }      │  transcribe  (Deepgram)   │
//! └──────────────────────┘                         │  complete    (Groq)       │
//!                                                  │  synthesize  (Deepgram)   │
//!                                                  │  persist     (store)      │
//!                                                  └───────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod services;
pub mod voice;

pub use config::{Config, PersistencePolicy, RecorderConfig};
pub use db::{ConversationRecord, ConversationStore, DbPool};
pub use error::{Error, Result, Service};
pub use orchestrator::VoiceOrchestrator;
pub use protocol::{VoiceReply, VoiceRequest};
