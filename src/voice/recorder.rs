//! Push-to-talk recorder
//!
//! ```text
//!        start            stop             settle
//! Idle ────────► Listening ────► Processing ──────► Idle
//!  ▲                 │
//!  └── empty capture ┘
//! ```
//!
//! `start` is ignored unless the recorder is idle, so at most one microphone
//! stream is ever open. Every submission settles back to idle whether it
//! succeeds or fails; nothing is retried.

use super::{Microphone, Speaker, VoiceClient, samples_to_wav};
use crate::protocol::{NO_AUDIO_MESSAGE, VoiceReply, VoiceRequest};
use crate::{Error, Result};

/// Where the recorder is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Listening,
    Processing,
}

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The microphone is now open
    Started,
    /// The recorder was busy; nothing changed
    Ignored(RecorderState),
}

/// Result of a toggle
#[derive(Debug)]
pub enum ToggleOutcome {
    /// Recording began
    Started,
    /// Recording ended and the reply was handled
    Replied(Exchange),
    /// A submission was in flight; nothing changed
    Ignored,
}

/// A finished recording ready to send
#[derive(Debug, Clone)]
pub struct Submission {
    pub request: VoiceRequest,
    /// Size of the encoded WAV before base64
    pub wav_bytes: usize,
}

/// A completed round trip
#[derive(Debug)]
pub struct Exchange {
    /// Assistant reply text
    pub text: String,
    /// Outcome of playing the reply audio
    pub playback: Result<()>,
}

/// Records, submits and plays back one utterance at a time
pub struct Recorder<M, C, S> {
    microphone: M,
    client: C,
    speaker: S,
    state: RecorderState,
}

impl<M, C, S> Recorder<M, C, S>
where
    M: Microphone,
    C: VoiceClient,
    S: Speaker,
{
    /// Create an idle recorder
    #[must_use]
    pub const fn new(microphone: M, client: C, speaker: S) -> Self {
        Self {
            microphone,
            client,
            speaker,
            state: RecorderState::Idle,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> RecorderState {
        self.state
    }

    /// Open the microphone and start listening
    ///
    /// # Errors
    ///
    /// Returns `Error::Permission` if the microphone cannot be opened; the
    /// recorder stays idle
    pub fn start(&mut self) -> Result<StartOutcome> {
        if self.state != RecorderState::Idle {
            tracing::debug!(state = ?self.state, "start ignored");
            return Ok(StartOutcome::Ignored(self.state));
        }

        self.microphone.open()?;
        self.state = RecorderState::Listening;
        tracing::info!("listening");
        Ok(StartOutcome::Started)
    }

    /// Close the microphone and package the capture for submission
    ///
    /// Returns `Ok(None)` when not listening.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if nothing was captured, or `Error::Audio`
    /// if encoding fails; either way the recorder returns to idle
    pub fn stop(&mut self) -> Result<Option<Submission>> {
        if self.state != RecorderState::Listening {
            return Ok(None);
        }

        let samples = self.microphone.close();
        if samples.is_empty() {
            self.state = RecorderState::Idle;
            return Err(Error::Validation(NO_AUDIO_MESSAGE.to_string()));
        }

        let wav = match samples_to_wav(&samples, self.microphone.sample_rate()) {
            Ok(wav) => wav,
            Err(e) => {
                self.state = RecorderState::Idle;
                return Err(e);
            }
        };

        self.state = RecorderState::Processing;
        tracing::info!(samples = samples.len(), wav_bytes = wav.len(), "processing");

        Ok(Some(Submission {
            request: VoiceRequest::from_audio(&wav),
            wav_bytes: wav.len(),
        }))
    }

    /// Return to idle with the outcome of a submission
    ///
    /// On success the reply audio is played; a playback failure is reported
    /// in the returned [`Exchange`] rather than as an error.
    ///
    /// # Errors
    ///
    /// Returns the submission error unchanged
    pub fn settle(&mut self, result: Result<VoiceReply>) -> Result<Exchange> {
        self.state = RecorderState::Idle;

        let reply = result.inspect_err(|e| {
            tracing::warn!(error = %e, "voice request failed");
        })?;

        let playback = self.speaker.play(&reply.audio);
        if let Err(ref e) = playback {
            tracing::warn!(error = %e, "failed to play reply");
        }

        Ok(Exchange {
            text: reply.text,
            playback,
        })
    }

    /// Stop, submit and settle in one step
    ///
    /// Returns `Ok(None)` when not listening.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::stop`] or the submission
    pub async fn stop_and_submit(&mut self) -> Result<Option<Exchange>> {
        let Some(submission) = self.stop()? else {
            return Ok(None);
        };

        let result = self.client.submit(&submission.request).await;
        self.settle(result).map(Some)
    }

    /// Single-button control: start when idle, submit when listening
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::start`] or [`Self::stop_and_submit`]
    pub async fn toggle(&mut self) -> Result<ToggleOutcome> {
        match self.state {
            RecorderState::Idle => {
                self.start()?;
                Ok(ToggleOutcome::Started)
            }
            RecorderState::Listening => match self.stop_and_submit().await? {
                Some(exchange) => Ok(ToggleOutcome::Replied(exchange)),
                None => Ok(ToggleOutcome::Ignored),
            },
            RecorderState::Processing => Ok(ToggleOutcome::Ignored),
        }
    }
}
