//! Progressive rendering over a WebSocket.
//!
//! The client opens `/chat/stream` and sends one JSON request. The server
//! answers with `status`, a `text` frame carrying the whole running text
//! after every delta, `progress` frames, an `audio` frame once the stream is
//! complete, and a closing `complete` (or `error`) frame.

use std::sync::atomic::Ordering;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::SinkExt;
use llm_core::{ResponseObserver, StreamProgress};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::chat::{run_chat_turn, turn_input, TurnSettings};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StreamChatRequest {
    pub message: Option<String>,
    pub audio_base64: Option<String>,
    pub file_name: Option<String>,
    #[serde(flatten)]
    pub settings: TurnSettings,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status { status: &'static str },
    Text { text: String },
    Progress { percent: u8 },
    Audio { audio_base64: String, format: String },
    Complete { conversation_id: String, reply: String, audio_error: Option<String> },
    Error { error: String, code: u16 },
}

impl StreamEvent {
    fn from_error(e: &ApiError) -> Self {
        StreamEvent::Error {
            error: e.to_string(),
            code: e.status().as_u16(),
        }
    }

    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self).ok().map(|json| Message::Text(json.into()))
    }
}

/// Forwards running text and progress to the socket task.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ResponseObserver for ChannelObserver {
    fn on_text(&mut self, text: &str) {
        let _ = self.tx.send(StreamEvent::Text { text: text.to_string() });
    }

    fn on_progress(&mut self, progress: StreamProgress) {
        let _ = self.tx.send(StreamEvent::Progress {
            percent: progress.percent,
        });
    }
}

pub async fn stream_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let request = match read_request(&mut socket).await {
        Some(Ok(request)) => request,
        Some(Err(e)) => {
            send_event(&mut socket, &StreamEvent::from_error(&e)).await;
            let _ = socket.close().await;
            return;
        }
        None => return,
    };
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let (tx, mut rx) = mpsc::unbounded_channel::<StreamEvent>();
    // The turn runs on its own task; the socket may go away mid-stream and
    // the turn still commits to the conversation log.
    let turn = tokio::spawn(stream_events(state, request, tx));

    let mut client_gone = false;
    while let Some(event) = rx.recv().await {
        if client_gone {
            continue;
        }
        if let Some(msg) = event.to_message() {
            if let Err(e) = socket.send(msg).await {
                warn!("Failed to send WS message: {e}");
                client_gone = true;
            }
        }
    }

    if let Err(join_err) = turn.await {
        error!("Task join error: {join_err}");
        if !client_gone {
            let e = ApiError::InternalError(format!("Task join error: {join_err}"));
            send_event(&mut socket, &StreamEvent::from_error(&e)).await;
        }
    }
    if !client_gone {
        let _ = socket.close().await;
    }
}

/// Run one streamed request and emit its frames in order: `status`, then
/// `text`/`progress` while the reply streams, then `audio` (when speech came
/// back) and `complete`. Any failure ends the sequence with a single `error`.
pub async fn stream_events(state: AppState, request: StreamChatRequest, tx: mpsc::UnboundedSender<StreamEvent>) {
    let input = match turn_input(
        request.message.as_deref(),
        request.audio_base64.as_deref(),
        request.file_name.as_deref(),
    ) {
        Ok(input) => input,
        Err(e) => {
            let _ = tx.send(StreamEvent::from_error(&e));
            return;
        }
    };

    let _ = tx.send(StreamEvent::Status { status: "generating" });

    let mut observer = ChannelObserver { tx: tx.clone() };
    match run_chat_turn(&state, &request.settings, input, &mut observer).await {
        Ok(reply) => {
            debug!("Streamed turn complete for conv_id={}", reply.conversation_id);
            if let (Some(audio_base64), Some(format)) = (reply.audio_base64, reply.audio_format) {
                let _ = tx.send(StreamEvent::Audio {
                    audio_base64,
                    format: format.to_string(),
                });
            }
            let _ = tx.send(StreamEvent::Complete {
                conversation_id: reply.conversation_id,
                reply: reply.reply,
                audio_error: reply.audio_error,
            });
        }
        Err(e) => {
            let _ = tx.send(StreamEvent::from_error(&e));
        }
    }
}

/// Wait for the first text frame and parse it as a chat request. `None`
/// means the client left before sending one.
async fn read_request(socket: &mut WebSocket) -> Option<Result<StreamChatRequest, ApiError>> {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                return Some(
                    serde_json::from_str::<StreamChatRequest>(text.as_str())
                        .map_err(|e| ApiError::InvalidInput(format!("Invalid stream request: {e}"))),
                );
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

async fn send_event(socket: &mut WebSocket, event: &StreamEvent) {
    if let Some(msg) = event.to_message() {
        if let Err(e) = socket.send(msg).await {
            warn!("Failed to send WS message: {e}");
        }
    }
}
