//! Voice client
//!
//! Captures microphone audio, submits it to the orchestrator endpoint and
//! plays the spoken reply. The pieces meet behind three small traits so the
//! recorder flow can run without audio hardware or a network.

mod capture;
mod client;
mod playback;
mod recorder;

use async_trait::async_trait;

use crate::Result;
use crate::protocol::{VoiceReply, VoiceRequest};

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use client::OrchestratorClient;
pub use playback::{
    AudioPlayback, DecodedAudio, LazyPlayback, PLAYBACK_SAMPLE_RATE, decode_audio, resample,
};
pub use recorder::{Exchange, Recorder, RecorderState, StartOutcome, ToggleOutcome, Submission};

/// Audio input device
pub trait Microphone {
    /// Begin capturing
    ///
    /// # Errors
    ///
    /// Returns `Error::Permission` if access is denied or no device exists
    fn open(&mut self) -> Result<()>;

    /// Stop capturing and return everything captured since `open`
    fn close(&mut self) -> Vec<f32>;

    /// Sample rate of captured audio
    fn sample_rate(&self) -> u32;
}

/// Transport to the orchestrator
#[async_trait]
pub trait VoiceClient: Send + Sync {
    /// Submit one utterance and wait for the reply
    async fn submit(&self, request: &VoiceRequest) -> Result<VoiceReply>;
}

/// Audio output device
pub trait Speaker {
    /// Decode and play encoded reply audio, blocking until done
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the audio cannot be decoded or played
    fn play(&mut self, audio: &[u8]) -> Result<()>;
}
