use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by request building, the remote call and stream assembly.
#[derive(Debug, Error)]
pub enum LlmError {
    /// A required setting (the API token) is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Neither text nor audio was supplied for a turn.
    #[error("nothing to send: provide a text message or an audio recording")]
    EmptyInput,

    #[error("invalid request options: {0}")]
    InvalidOptions(String),

    /// The remote call failed or the stream ended abnormally.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A streamed event could not be parsed into a fragment.
    #[error("malformed stream event: {0}")]
    Decode(String),

    #[error("no stream activity for {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl LlmError {
    /// Whether the failure happened talking to the remote endpoint, as
    /// opposed to being rejected locally before any request was made.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            LlmError::Transport(_) | LlmError::Api { .. } | LlmError::Decode(_) | LlmError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
