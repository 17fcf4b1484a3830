//! Outbound chat request construction.
//!
//! A turn is either free text or a base64-encoded recording, never both.
//! Speech-synthesis options are only serialized when audio output was
//! requested; with `generate_audio` off the body carries no `tts_*` keys
//! at all.

use std::fmt;
use std::str::FromStr;

use audio_core::AudioFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

pub const DEFAULT_MAX_TOKENS: u32 = 128;
pub const DEFAULT_AUDIO_BITRATE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One structured part of a non-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Audio { data: String },
}

/// Message body: plain text, or a list of structured parts (the audio reference).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn audio(data: impl Into<String>) -> Self {
        MessageContent::Parts(vec![ContentPart::Audio { data: data.into() }])
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(_) => None,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, MessageContent::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::Audio { .. })))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: MessageContent) -> Self {
        Self {
            role: Role::User,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
            created_at: Utc::now(),
        }
    }
}

/// Named speech-synthesis voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePreset {
    #[default]
    Jessica,
    Josh,
    Emma,
    Michael,
}

impl VoicePreset {
    pub const ALL: [VoicePreset; 4] = [
        VoicePreset::Jessica,
        VoicePreset::Josh,
        VoicePreset::Emma,
        VoicePreset::Michael,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VoicePreset::Jessica => "jessica",
            VoicePreset::Josh => "josh",
            VoicePreset::Emma => "emma",
            VoicePreset::Michael => "michael",
        }
    }
}

impl fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoicePreset {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        VoicePreset::ALL
            .into_iter()
            .find(|preset| preset.as_str() == wanted)
            .ok_or_else(|| {
                LlmError::InvalidOptions(format!(
                    "unknown voice preset '{}'. Available presets: {}",
                    s,
                    VoicePreset::ALL.map(|p| p.as_str()).join(", ")
                ))
            })
    }
}

/// Per-request settings taken from the caller's current UI state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub max_tokens: u32,
    pub generate_audio: bool,
    pub voice_preset: VoicePreset,
    pub audio_format: AudioFormat,
    pub audio_bitrate: u32,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            generate_audio: true,
            voice_preset: VoicePreset::default(),
            audio_format: AudioFormat::Mp3,
            audio_bitrate: DEFAULT_AUDIO_BITRATE,
        }
    }
}

/// What the user sent this turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnInput {
    pub text: Option<String>,
    /// Base64-encoded recording.
    pub audio: Option<String>,
}

impl TurnInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            audio: None,
        }
    }

    pub fn audio(base64: impl Into<String>) -> Self {
        Self {
            text: None,
            audio: Some(base64.into()),
        }
    }

    /// The single user message for this turn. Audio takes precedence and is
    /// never combined with text.
    pub fn to_message(&self) -> Result<ChatMessage> {
        if let Some(audio) = self.audio.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            return Ok(ChatMessage::user(MessageContent::audio(audio)));
        }
        match self.text.as_deref() {
            Some(text) if !text.trim().is_empty() => {
                Ok(ChatMessage::user(MessageContent::Text(text.to_string())))
            }
            _ => Err(LlmError::EmptyInput),
        }
    }
}

/// Speech-synthesis keys merged into the top level of the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtsOptions {
    pub tts_audio_format: AudioFormat,
    pub tts_audio_bitrate: u32,
    pub require_audio: bool,
    pub tts_preset_id: VoicePreset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl From<&ChatMessage> for RequestMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Body of a streaming chat-completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(flatten)]
    pub tts: Option<TtsOptions>,
}

impl ChatRequest {
    pub fn new(model: &str, message: &ChatMessage, options: &RequestOptions) -> Result<Self> {
        if options.max_tokens == 0 {
            return Err(LlmError::InvalidOptions("max_tokens must be positive".to_string()));
        }

        let tts = options.generate_audio.then(|| TtsOptions {
            tts_audio_format: options.audio_format,
            tts_audio_bitrate: options.audio_bitrate,
            require_audio: true,
            tts_preset_id: options.voice_preset,
        });

        Ok(Self {
            model: model.to_string(),
            messages: vec![RequestMessage::from(message)],
            max_tokens: options.max_tokens,
            stream: true,
            tts,
        })
    }
}

/// Build the outbound request for one turn. Pure: no I/O.
pub fn build_request(model: &str, input: &TurnInput, options: &RequestOptions) -> Result<ChatRequest> {
    let message = input.to_message()?;
    ChatRequest::new(model, &message, options)
}
