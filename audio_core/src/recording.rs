//! Recorded or uploaded audio on its way to the chat endpoint.
//!
//! Recordings stay in memory; nothing is staged on disk, so there is no
//! temporary file to leak when a turn fails.

use std::io::Cursor;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use crate::wav::encode_wav;
use crate::AudioError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAudio {
    bytes: Vec<u8>,
    file_name: Option<String>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
    duration: Option<Duration>,
}

impl RecordedAudio {
    /// Microphone capture: WAV bytes, validated and inspected.
    pub fn from_wav(bytes: Vec<u8>) -> Result<Self, AudioError> {
        if bytes.is_empty() {
            return Err(AudioError::EmptyRecording);
        }
        let reader = hound::WavReader::new(Cursor::new(bytes.as_slice()))
            .map_err(|e| AudioError::InvalidRecording(format!("not a WAV file: {e}")))?;
        let spec = reader.spec();
        if spec.sample_rate == 0 || spec.channels == 0 {
            return Err(AudioError::InvalidRecording("WAV header has no audio format".to_string()));
        }
        let frames = reader.duration();
        let duration = Duration::from_secs_f64(f64::from(frames) / f64::from(spec.sample_rate));

        debug!(
            "Recording: {} Hz, {} channel(s), {:.2}s",
            spec.sample_rate,
            spec.channels,
            duration.as_secs_f64()
        );

        Ok(Self {
            bytes,
            file_name: None,
            sample_rate: Some(spec.sample_rate),
            channels: Some(spec.channels),
            duration: Some(duration),
        })
    }

    /// Uploaded file of any container; passed through without inspection.
    pub fn from_upload(bytes: Vec<u8>, file_name: impl Into<String>) -> Result<Self, AudioError> {
        if bytes.is_empty() {
            return Err(AudioError::EmptyRecording);
        }
        Ok(Self {
            bytes,
            file_name: Some(file_name.into()),
            sample_rate: None,
            channels: None,
            duration: None,
        })
    }

    /// Raw mono samples from a capture device.
    pub fn from_pcm(samples: &[f32], sample_rate: u32) -> Result<Self, AudioError> {
        if samples.is_empty() {
            return Err(AudioError::EmptyRecording);
        }
        Self::from_wav(encode_wav(samples, sample_rate)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn channels(&self) -> Option<u16> {
        self.channels
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Payload for an audio message.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}
