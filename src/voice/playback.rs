//! Audio playback to speakers
//!
//! Reply audio arrives as encoded bytes. WAV (RIFF) is decoded with `hound`,
//! anything else is treated as MP3 and decoded with `minimp3`. Decoded
//! samples are resampled to the device rate with `rubato`.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::Speaker;
use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Mono PCM decoded from a reply
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        };

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| c.channels() == 1 && supports_rate(c))
            .or_else(|| {
                // Fallback: try stereo
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| c.channels() == 2 && supports_rate(c))
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { config })
    }

    /// Play mono samples at [`PLAYBACK_SAMPLE_RATE`], blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be opened
    pub fn play_samples(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = self.config.clone();
        let channels = usize::from(config.channels.max(1));
        let sample_count = samples.len();

        let cursor = Arc::new(Mutex::new((samples, 0usize)));
        let finished = Arc::new(Mutex::new(false));
        let cursor_cb = Arc::clone(&cursor);
        let finished_cb = Arc::clone(&finished);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut guard) = cursor_cb.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    let (samples, pos) = &mut *guard;

                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(*pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if *pos < samples.len() {
                            *pos += 1;
                        }
                    }

                    if *pos >= samples.len() {
                        if let Ok(mut done) = finished_cb.lock() {
                            *done = true;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let start = Instant::now();
        let timeout = Duration::from_millis(duration_ms + 500);

        while !finished.lock().map(|done| *done).unwrap_or(true) {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }

    /// Resample decoded reply audio to the device rate and play it
    ///
    /// # Errors
    ///
    /// Returns error if resampling fails or the output stream cannot be opened
    pub fn play_decoded(&self, decoded: &DecodedAudio) -> Result<()> {
        let samples = resample(&decoded.samples, decoded.sample_rate, PLAYBACK_SAMPLE_RATE)?;
        self.play_samples(samples)
    }
}

impl Speaker for AudioPlayback {
    fn play(&mut self, audio: &[u8]) -> Result<()> {
        self.play_decoded(&decode_audio(audio)?)
    }
}

/// Speaker that opens the output device on first playback
///
/// A missing output device then fails that playback only, not the session.
#[derive(Default)]
pub struct LazyPlayback {
    inner: Option<AudioPlayback>,
}

impl LazyPlayback {
    /// Whether the output device has been opened
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.inner.is_some()
    }
}

impl Speaker for LazyPlayback {
    fn play(&mut self, audio: &[u8]) -> Result<()> {
        let decoded = decode_audio(audio)?;
        let playback = match self.inner.take() {
            Some(playback) => playback,
            None => AudioPlayback::new()?,
        };

        let result = playback.play_decoded(&decoded);
        self.inner = Some(playback);
        result
    }
}

/// Decode WAV or MP3 bytes to mono samples
///
/// # Errors
///
/// Returns `Error::Audio` if the bytes are neither valid WAV nor MP3
pub fn decode_audio(bytes: &[u8]) -> Result<DecodedAudio> {
    if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)
    } else {
        decode_mp3(bytes)
    }
}

#[allow(clippy::cast_precision_loss)]
fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
    };

    Ok(DecodedAudio {
        samples: to_mono(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

fn decode_mp3(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate.get_or_insert(frame.sample_rate);
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(to_mono(&pcm, frame.channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate = sample_rate
        .and_then(|r| u32::try_from(r).ok())
        .ok_or_else(|| Error::Audio("no MP3 frames found".to_string()))?;

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

#[allow(clippy::cast_precision_loss)]
fn to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio between sample rates with rubato
///
/// The final partial chunk is zero-padded and the resampler's delay is
/// trimmed, so the output covers the whole input.
///
/// # Errors
///
/// Returns `Error::Audio` if the resampler cannot be built or run
#[allow(clippy::cast_possible_truncation)]
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    const CHUNK_SIZE: usize = 1024;
    const SUB_CHUNKS: usize = 2;

    if from == to || from == 0 || to == 0 || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f64>::new(from as usize, to as usize, CHUNK_SIZE, SUB_CHUNKS, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;
    let resample_err = |e: rubato::ResampleError| Error::Audio(format!("resample failed: {e}"));

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let expected = usize::try_from(
        (input.len() as u64 * u64::from(to)).div_ceil(u64::from(from)),
    )
    .unwrap_or(usize::MAX);
    let delay = resampler.output_delay();
    let mut output: Vec<f64> = Vec::with_capacity(expected + delay);

    let mut chunks = input.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let result = resampler.process(&[chunk], None).map_err(resample_err)?;
        output.extend_from_slice(&result[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let result = resampler
            .process_partial(Some(&[rest][..]), None)
            .map_err(resample_err)?;
        output.extend_from_slice(&result[0]);
    }

    // Flush samples still held back by the resampler delay
    while output.len() < expected + delay {
        let result = resampler
            .process_partial::<&[f64]>(None, None)
            .map_err(resample_err)?;
        if result[0].is_empty() {
            break;
        }
        output.extend_from_slice(&result[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);

    Ok(output.iter().map(|&s| s as f32).collect())
}
