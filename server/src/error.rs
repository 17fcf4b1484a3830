use audio_core::AudioError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use llm_core::LlmError;
use serde::Serialize;
use thiserror::Error;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Please enter a message or record audio.")]
    EmptyInput,

    /// The chat endpoint credential is missing; nothing can be sent until fixed.
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream timeout: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::EmptyInput => StatusCode::BAD_REQUEST,
            ApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::EmptyInput => ApiError::EmptyInput,
            LlmError::InvalidOptions(msg) => ApiError::InvalidInput(msg),
            LlmError::Configuration(msg) => ApiError::NotConfigured(msg),
            LlmError::Timeout(_) => ApiError::Timeout(e.to_string()),
            LlmError::Transport(_) | LlmError::Api { .. } | LlmError::Decode(_) => {
                ApiError::Upstream(e.to_string())
            }
        }
    }
}

impl From<AudioError> for ApiError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::Io(io) => ApiError::InternalError(format!("audio file error: {io}")),
            other => ApiError::InvalidInput(other.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Upstream(msg) | ApiError::Timeout(msg) => tracing::error!("Chat endpoint failure: {}", msg),
            ApiError::InternalError(msg) => tracing::error!("Internal error: {}", msg),
            ApiError::NotConfigured(msg) => tracing::warn!("Request refused, not configured: {}", msg),
            _ => {}
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
