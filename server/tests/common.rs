//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use futures_util::{stream, StreamExt};
use llm_core::{ChatBackend, ChatRequest, FragmentStream, LlmError, ResponseFragment};
use server::config::ServerConfig;
use server::state::{AppState, LlmStatus};
use tower::ServiceExt;

/// In-process stand-in for the hosted chat endpoint.
pub struct FakeBackend {
    pub fragments: Vec<ResponseFragment>,
    /// Error appended after the scripted fragments.
    pub fail_mid_stream: bool,
    /// Never finish after the scripted fragments.
    pub stall_mid_stream: bool,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl FakeBackend {
    pub fn replying(fragments: Vec<ResponseFragment>) -> Self {
        Self {
            fragments,
            fail_mid_stream: false,
            stall_mid_stream: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// "Hello there" followed by two base64 mp3 fragments.
    pub fn speaking() -> Self {
        Self::replying(vec![
            ResponseFragment::Metadata,
            ResponseFragment::text("Hello "),
            ResponseFragment::Delta {
                text: Some("there".to_string()),
                audio: vec![general_purpose::STANDARD.encode(b"ID3")],
            },
            ResponseFragment::audio([general_purpose::STANDARD.encode(b"frame")]),
        ])
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn stream_chat(&self, request: &ChatRequest) -> llm_core::Result<FragmentStream> {
        self.requests.lock().unwrap().push(request.clone());
        let mut items: Vec<llm_core::Result<ResponseFragment>> =
            self.fragments.iter().cloned().map(Ok).collect();
        if self.fail_mid_stream {
            items.push(Err(LlmError::Api {
                status: 502,
                message: "stream reset".to_string(),
            }));
        }
        if self.stall_mid_stream {
            return Ok(Box::pin(stream::iter(items).chain(stream::pending())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Shared state around the given backend
pub fn create_test_state(backend: Arc<FakeBackend>, config: ServerConfig) -> AppState {
    AppState::new(LlmStatus::Ready(backend), config)
}

/// Create a test app around the given backend
pub fn create_test_app(backend: Arc<FakeBackend>) -> Router {
    create_test_app_with_config(backend, ServerConfig::default())
}

pub fn create_test_app_with_config(backend: Arc<FakeBackend>, config: ServerConfig) -> Router {
    server::build_router(create_test_state(backend, config)).expect("router should build")
}

/// Create a test app whose chat client failed to configure
pub fn create_unconfigured_app() -> Router {
    let state = AppState::new(
        LlmStatus::Unconfigured("LEPTON_API_TOKEN not found in environment variables".to_string()),
        ServerConfig::default(),
    );
    server::build_router(state).expect("router should build with default config")
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, value)
}
