//! Wire types shared by the recorder and the orchestrator endpoint
//!
//! Requests carry base64 audio; replies carry audio as a JSON array of byte
//! values so browser clients can rebuild a `Uint8Array` directly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Message returned when a request carries no audio
pub const NO_AUDIO_MESSAGE: &str = "no audio data provided";

/// Recorder → orchestrator request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRequest {
    /// Base64-encoded WAV audio
    #[serde(rename = "audioData", default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
}

impl VoiceRequest {
    /// Build a request from raw audio bytes
    #[must_use]
    pub fn from_audio(audio: &[u8]) -> Self {
        Self {
            audio_data: Some(encode_audio(audio)),
        }
    }

    /// Decode the carried audio
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the payload is absent, empty, or not base64
    pub fn decode_audio(&self) -> Result<Vec<u8>> {
        let encoded = self
            .audio_data
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Validation(NO_AUDIO_MESSAGE.to_string()))?;

        let audio = decode_audio(encoded)?;
        if audio.is_empty() {
            return Err(Error::Validation(NO_AUDIO_MESSAGE.to_string()));
        }
        Ok(audio)
    }
}

/// Orchestrator success response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceReply {
    /// Assistant reply text
    pub text: String,
    /// Synthesized audio, one number per byte
    pub audio: Vec<u8>,
}

/// Orchestrator failure response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Encode audio bytes as standard padded base64
#[must_use]
pub fn encode_audio(audio: &[u8]) -> String {
    STANDARD.encode(audio)
}

/// Decode standard base64 audio
///
/// # Errors
///
/// Returns `Error::Validation` if the input is not valid base64
pub fn decode_audio(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| Error::Validation(format!("audio data is not valid base64: {e}")))
}
