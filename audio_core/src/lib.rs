//! Audio handling at both ends of a voice turn: recorded input is turned
//! into the base64 payload the chat endpoint expects, and streamed base64
//! speech fragments are decoded into a playable, self-deleting file.

mod materialize;
mod recording;
mod wav;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use materialize::{decode_fragments, materialize, MaterializedAudio};
pub use recording::RecordedAudio;
pub use wav::encode_wav;

/// Container format of synthesized speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    /// One streamed fragment was not valid base64.
    #[error("audio fragment {index} is not valid base64: {source}")]
    Decode {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },

    #[error("audio file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    #[error("recording is empty")]
    EmptyRecording,
}
