//! Caller-owned conversation log and the per-turn pipeline.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assembler::{assemble, AssembledResponse, ResponseObserver};
use crate::client::ChatBackend;
use crate::error::LlmError;
use crate::request::{ChatMessage, ChatRequest, RequestOptions, TurnInput};

/// Append-only message history for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

/// The log as it stands after the turn, plus what the turn produced.
#[derive(Debug)]
pub struct TurnResult {
    pub log: ConversationLog,
    pub outcome: Result<AssembledResponse, LlmError>,
}

/// Run one request/response cycle: build, stream, assemble, commit.
///
/// The log comes back unchanged unless the stream was consumed to the end
/// without error, in which case the user message and the assistant reply
/// are appended together.
pub async fn process_turn<B, O>(
    backend: &B,
    mut log: ConversationLog,
    input: &TurnInput,
    options: &RequestOptions,
    observer: &mut O,
    idle_timeout: Option<Duration>,
) -> TurnResult
where
    B: ChatBackend + ?Sized,
    O: ResponseObserver + ?Sized,
{
    let started = Instant::now();
    match run(backend, input, options, observer, idle_timeout).await {
        Ok((user_message, response)) => {
            info!(
                "Turn complete in {:.2}s: reply length={}, audio fragments={}",
                started.elapsed().as_secs_f64(),
                response.full_text.len(),
                response.audio_fragments.len()
            );
            log.append(user_message);
            log.append(ChatMessage::assistant(response.full_text.clone()));
            TurnResult {
                log,
                outcome: Ok(response),
            }
        }
        Err(e) => {
            if e.is_remote() {
                warn!("Turn failed after {:.2}s: {}", started.elapsed().as_secs_f64(), e);
            }
            TurnResult { log, outcome: Err(e) }
        }
    }
}

async fn run<B, O>(
    backend: &B,
    input: &TurnInput,
    options: &RequestOptions,
    observer: &mut O,
    idle_timeout: Option<Duration>,
) -> Result<(ChatMessage, AssembledResponse), LlmError>
where
    B: ChatBackend + ?Sized,
    O: ResponseObserver + ?Sized,
{
    let user_message = input.to_message()?;
    let request = ChatRequest::new(backend.model(), &user_message, options)?;
    let fragments = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, backend.stream_chat(&request))
            .await
            .map_err(|_| LlmError::Timeout(limit))??,
        None => backend.stream_chat(&request).await?,
    };
    let response = assemble(fragments, options.max_tokens, observer, idle_timeout).await?;
    Ok((user_message, response))
}
