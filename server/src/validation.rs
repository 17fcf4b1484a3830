use base64::{engine::general_purpose, Engine as _};
use llm_core::VoicePreset;

use audio_core::RecordedAudio;

use crate::error::ApiError;

/// Maximum text length for chat messages
const MAX_MESSAGE_LENGTH: usize = 5000;
/// Response length bounds offered to users
pub const MIN_MAX_TOKENS: u32 = 50;
pub const MAX_MAX_TOKENS: u32 = 500;

/// Validate a typed chat message
pub fn validate_chat_message(message: &str) -> Result<(), ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::EmptyInput);
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Message too long (max {} characters)",
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(())
}

/// Conversation ids are server-issued UUIDs
pub fn validate_conversation_id(id: &str) -> Result<(), ApiError> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| ApiError::InvalidInput(format!("Invalid conversation id: {}", id)))
}

pub fn validate_max_tokens(max_tokens: u32) -> Result<(), ApiError> {
    if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&max_tokens) {
        return Err(ApiError::InvalidInput(format!(
            "max_tokens must be between {} and {}",
            MIN_MAX_TOKENS, MAX_MAX_TOKENS
        )));
    }
    Ok(())
}

pub fn parse_voice_preset(name: &str) -> Result<VoicePreset, ApiError> {
    name.parse::<VoicePreset>().map_err(ApiError::from)
}

/// Decode an uploaded recording. WAV data (RIFF header) is inspected,
/// anything else is passed through as an opaque upload.
pub fn decode_recording(audio_base64: &str, file_name: Option<&str>) -> Result<RecordedAudio, ApiError> {
    let trimmed = audio_base64.trim();
    if trimmed.is_empty() {
        return Err(ApiError::EmptyInput);
    }
    let bytes = general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| ApiError::InvalidInput(format!("audio_base64 is not valid base64: {e}")))?;

    let recording = if bytes.starts_with(b"RIFF") {
        RecordedAudio::from_wav(bytes)?
    } else {
        RecordedAudio::from_upload(bytes, file_name.unwrap_or("upload"))?
    };
    Ok(recording)
}
