use std::sync::atomic::Ordering;

use axum::{
    extract::{Path, State},
    Json,
};
use llm_core::{ChatMessage, VoicePreset};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chat::{run_chat_turn, turn_input, TurnReply, TurnSettings};
use crate::error::ApiError;
use crate::state::{AppState, LlmStatus};
use crate::validation::validate_conversation_id;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: Option<String>,
    pub message: Option<String>,
    pub request_count: u64,
    pub conversations: usize,
}

/// Reports whether the chat endpoint is usable. A missing token is shown
/// here rather than crashing the process.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, model, message) = match &state.llm {
        LlmStatus::Ready(backend) => ("ok", Some(backend.model().to_string()), None),
        LlmStatus::Unconfigured(msg) => (
            "unconfigured",
            None,
            Some(format!("{msg}. Please verify your LEPTON_API_TOKEN in the .env file")),
        ),
    };
    Json(HealthResponse {
        status,
        model,
        message,
        request_count: state.request_count.load(Ordering::Relaxed),
        conversations: state.sessions.len(),
    })
}

#[derive(Serialize)]
pub struct VoiceInfo {
    pub id: VoicePreset,
    pub default: bool,
}

pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<VoiceInfo>> {
    let voices = VoicePreset::ALL
        .into_iter()
        .map(|id| VoiceInfo {
            id,
            default: id == state.config.default_voice_preset,
        })
        .collect();
    Json(voices)
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(flatten)]
    pub settings: TurnSettings,
}

pub async fn chat_endpoint(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    info!("Chat request received: message length={}, conv_id={:?}", req.message.len(), req.settings.conversation_id);

    let input = turn_input(Some(&req.message), None, None)?;
    let reply = run_chat_turn(&state, &req.settings, input, &mut ()).await?;
    Ok(Json(reply))
}

#[derive(Deserialize)]
pub struct VoiceChatRequest {
    pub audio_base64: String,
    pub file_name: Option<String>,
    #[serde(flatten)]
    pub settings: TurnSettings,
}

pub async fn voice_chat_endpoint(
    State(state): State<AppState>,
    Json(req): Json<VoiceChatRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    info!("Voice chat request received: payload length={}, conv_id={:?}", req.audio_base64.len(), req.settings.conversation_id);

    let input = turn_input(None, Some(&req.audio_base64), req.file_name.as_deref())?;
    let reply = run_chat_turn(&state, &req.settings, input, &mut ()).await?;
    Ok(Json(reply))
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<ChatMessage>,
}

pub async fn conversation_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    validate_conversation_id(&id)?;
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown conversation: {id}")))?;
    let log = session.lock().await;
    Ok(Json(HistoryResponse {
        conversation_id: id,
        messages: log.messages().to_vec(),
    }))
}
