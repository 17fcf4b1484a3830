//! Server-sent-event decoding for streamed chat completions.
//!
//! Each `data:` line of the response body carries one JSON chunk of the form
//! `{"choices":[{"delta":{"content":"..."},"audio":["<b64>", ...]}]}`. The
//! chunk is validated here, once, into a [`ResponseFragment`]; nothing
//! downstream reads optional JSON fields.

use std::pin::Pin;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::{LlmError, Result};

const DONE_SENTINEL: &str = "[DONE]";

/// One incremental unit of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFragment {
    /// Transport-level chunk without any choice (usage, keep-alive, ...).
    Metadata,
    Delta {
        text: Option<String>,
        audio: Vec<String>,
    },
}

impl ResponseFragment {
    pub fn text(text: impl Into<String>) -> Self {
        ResponseFragment::Delta {
            text: Some(text.into()),
            audio: Vec::new(),
        }
    }

    pub fn audio<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ResponseFragment::Delta {
            text: None,
            audio: chunks.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse one `data:` payload.
    pub fn from_json(data: &str) -> Result<Self> {
        let chunk: ChunkWire = serde_json::from_str(data)
            .map_err(|e| LlmError::Decode(format!("{e}: {}", truncate(data, 120))))?;
        Ok(chunk.into())
    }
}

#[derive(Deserialize)]
struct ChunkWire {
    #[serde(default)]
    choices: Option<Vec<ChoiceWire>>,
}

#[derive(Deserialize)]
struct ChoiceWire {
    #[serde(default)]
    delta: Option<DeltaWire>,
    #[serde(default)]
    audio: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct DeltaWire {
    #[serde(default)]
    content: Option<String>,
}

impl From<ChunkWire> for ResponseFragment {
    fn from(chunk: ChunkWire) -> Self {
        // Only the first choice is consumed; the endpoint never sends `n > 1`.
        let Some(choice) = chunk.choices.and_then(|c| c.into_iter().next()) else {
            return ResponseFragment::Metadata;
        };
        ResponseFragment::Delta {
            text: choice
                .delta
                .and_then(|d| d.content)
                .filter(|text| !text.is_empty()),
            audio: choice.audio.unwrap_or_default(),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Incremental line splitter for an SSE body. Bytes are buffered until a
/// newline so multi-byte characters split across network reads survive.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        Self::parse_line(&rest)
    }

    fn parse_line(raw: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);
        // Comments, `event:`/`id:`/`retry:` fields and blank separators carry no payload.
        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);
        if data.trim().is_empty() {
            return None;
        }
        if data.trim() == DONE_SENTINEL {
            Some(SseEvent::Done)
        } else {
            Some(SseEvent::Data(data.to_string()))
        }
    }
}

/// Boxed fragment sequence handed from a backend to the assembler.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<ResponseFragment>> + Send>>;

/// Turn a raw SSE byte stream into typed fragments. Ends at `[DONE]` or when
/// the byte stream is exhausted, whichever comes first.
pub fn fragment_stream<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    Box::pin(decode_events(bytes))
}

fn decode_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<ResponseFragment>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::default();
        let mut finished = false;

        while !finished {
            let events = match bytes.next().await {
                Some(chunk) => {
                    let chunk: B = chunk.map_err(Into::<LlmError>::into)?;
                    decoder.feed(chunk.as_ref())
                }
                None => {
                    finished = true;
                    decoder.finish().into_iter().collect()
                }
            };

            for event in events {
                match event {
                    SseEvent::Data(data) => {
                        let fragment = ResponseFragment::from_json(&data)?;
                        yield fragment;
                    }
                    SseEvent::Done => {
                        finished = true;
                        break;
                    }
                }
            }
        }
    }
}
