//! One chat turn as the HTTP and WebSocket handlers run it.

use audio_core::AudioFormat;
use base64::{engine::general_purpose, Engine as _};
use llm_core::{process_turn, AssembledResponse, RequestOptions, ResponseObserver, TurnInput};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{
    decode_recording, parse_voice_preset, validate_chat_message, validate_conversation_id, validate_max_tokens,
};

/// Output settings shared by every chat request shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnSettings {
    pub conversation_id: Option<String>,
    pub generate_audio: Option<bool>,
    pub voice_preset: Option<String>,
    pub max_tokens: Option<u32>,
}

impl TurnSettings {
    pub fn request_options(&self, state: &AppState) -> Result<RequestOptions, ApiError> {
        let max_tokens = self.max_tokens.unwrap_or(state.config.default_max_tokens);
        validate_max_tokens(max_tokens)?;

        let voice_preset = match self.voice_preset.as_deref() {
            Some(name) => parse_voice_preset(name)?,
            None => state.config.default_voice_preset,
        };

        Ok(RequestOptions {
            max_tokens,
            generate_audio: self.generate_audio.unwrap_or(true),
            voice_preset,
            ..RequestOptions::default()
        })
    }
}

/// Build the turn input from either a typed message or a base64 recording.
/// A recording wins when both are present.
pub fn turn_input(
    message: Option<&str>,
    audio_base64: Option<&str>,
    file_name: Option<&str>,
) -> Result<TurnInput, ApiError> {
    if let Some(audio) = audio_base64.filter(|a| !a.trim().is_empty()) {
        let recording = decode_recording(audio, file_name)?;
        if let Some(duration) = recording.duration() {
            info!("Voice input: {} bytes, {:.1}s", recording.bytes().len(), duration.as_secs_f64());
        }
        return Ok(TurnInput::audio(recording.to_base64()));
    }
    let message = message.unwrap_or_default();
    validate_chat_message(message)?;
    Ok(TurnInput::text(message))
}

#[derive(Debug, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub conversation_id: String,
    pub audio_base64: Option<String>,
    pub audio_format: Option<AudioFormat>,
    /// Set when speech came back but could not be decoded; the text stands.
    pub audio_error: Option<String>,
}

/// Run a turn against the conversation's log and package the reply.
pub async fn run_chat_turn<O>(
    state: &AppState,
    settings: &TurnSettings,
    input: TurnInput,
    observer: &mut O,
) -> Result<TurnReply, ApiError>
where
    O: ResponseObserver + Send + ?Sized,
{
    let options = settings.request_options(state)?;
    let backend = state.llm.backend()?;

    let conversation_id = match settings.conversation_id.as_deref() {
        Some(id) => {
            validate_conversation_id(id)?;
            id.to_string()
        }
        None => uuid::Uuid::new_v4().to_string(),
    };

    let lease = state.sessions.checkout(&conversation_id);
    let mut log = lease.session().lock().await;

    info!(
        "Chat turn: conv_id={}, audio_input={}, generate_audio={}, voice={}",
        conversation_id,
        input.audio.is_some(),
        options.generate_audio,
        options.voice_preset
    );

    // The stored log is only replaced once the turn has run to the end; a
    // dropped request leaves it as it was.
    let result = process_turn(
        backend.as_ref(),
        log.clone(),
        &input,
        &options,
        observer,
        Some(state.config.llm_timeout()),
    )
    .await;
    *log = result.log;
    drop(log);

    let response = result.outcome?;
    lease.commit();
    let (audio_base64, audio_error) = if options.generate_audio {
        encode_reply_audio(&response, options.audio_format)
    } else {
        (None, None)
    };

    Ok(TurnReply {
        reply: response.full_text,
        conversation_id,
        audio_format: audio_base64.as_ref().map(|_| options.audio_format),
        audio_base64,
        audio_error,
    })
}

/// Decode the reply's speech through a scoped temp file. A bad fragment
/// only costs the audio; the caller still gets the text.
pub fn encode_reply_audio(response: &AssembledResponse, format: AudioFormat) -> (Option<String>, Option<String>) {
    let bytes = audio_core::materialize(&response.audio_fragments, format)
        .and_then(|audio| audio.map(|a| a.into_bytes()).transpose());

    match bytes {
        Ok(Some(bytes)) => (Some(general_purpose::STANDARD.encode(bytes)), None),
        Ok(None) => (None, None),
        Err(e) => {
            warn!("Skipping reply audio: {}", e);
            (None, Some(e.to_string()))
        }
    }
}
