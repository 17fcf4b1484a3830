//! Folding a fragment stream into one response.
//!
//! Text deltas and audio fragments are appended strictly in arrival order.
//! Audio is kept base64-encoded; decoding happens once the stream is over.

use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::error::{LlmError, Result};
use crate::stream::ResponseFragment;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssembledResponse {
    pub full_text: String,
    pub audio_fragments: Vec<String>,
}

impl AssembledResponse {
    pub fn has_audio(&self) -> bool {
        !self.audio_fragments.is_empty()
    }
}

/// Rough completion estimate; the endpoint sends about one fragment per token.
/// Every fragment counts, metadata-only ones included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamProgress {
    pub fragments_seen: u32,
    pub percent: u8,
}

/// Display collaborator fed while a response streams in.
pub trait ResponseObserver {
    /// Called with the whole running text after every non-empty delta.
    fn on_text(&mut self, _text: &str) {}

    fn on_progress(&mut self, _progress: StreamProgress) {}
}

/// Observer that ignores everything.
impl ResponseObserver for () {}

/// Plain closures observe text only.
impl<F> ResponseObserver for F
where
    F: FnMut(&str),
{
    fn on_text(&mut self, text: &str) {
        self(text)
    }
}

#[derive(Debug)]
pub struct ResponseAssembler {
    response: AssembledResponse,
    fragments_seen: u32,
    max_tokens: u32,
}

impl ResponseAssembler {
    /// `max_tokens` only scales the progress estimate.
    pub fn new(max_tokens: u32) -> Self {
        Self {
            response: AssembledResponse::default(),
            fragments_seen: 0,
            max_tokens: max_tokens.max(1),
        }
    }

    pub fn text(&self) -> &str {
        &self.response.full_text
    }

    pub fn progress(&self) -> StreamProgress {
        let percent = (u64::from(self.fragments_seen) * 100 / u64::from(self.max_tokens)).min(100);
        StreamProgress {
            fragments_seen: self.fragments_seen,
            percent: percent as u8,
        }
    }

    /// Apply one fragment. Returns the running text when it grew.
    pub fn push(&mut self, fragment: ResponseFragment) -> Option<&str> {
        self.fragments_seen = self.fragments_seen.saturating_add(1);
        let ResponseFragment::Delta { text, audio } = fragment else {
            return None;
        };
        self.response.audio_fragments.extend(audio);

        match text {
            Some(delta) if !delta.is_empty() => {
                self.response.full_text.push_str(&delta);
                Some(&self.response.full_text)
            }
            _ => None,
        }
    }

    pub fn finish(self) -> AssembledResponse {
        self.response
    }
}

/// Drain `fragments` into an [`AssembledResponse`], reporting running text and
/// progress to `observer`. With `idle_timeout` set, waiting longer than that
/// for the next fragment aborts with [`LlmError::Timeout`]. The first
/// stream error is returned as-is and nothing partial is handed back.
pub async fn assemble<S, O>(
    fragments: S,
    max_tokens: u32,
    observer: &mut O,
    idle_timeout: Option<Duration>,
) -> Result<AssembledResponse>
where
    S: Stream<Item = Result<ResponseFragment>>,
    O: ResponseObserver + ?Sized,
{
    let mut fragments = Box::pin(fragments);
    let mut assembler = ResponseAssembler::new(max_tokens);

    while let Some(fragment) = next_fragment(&mut fragments, idle_timeout).await? {
        let is_metadata = matches!(fragment, ResponseFragment::Metadata);
        if let Some(text) = assembler.push(fragment) {
            observer.on_text(text);
        }
        if !is_metadata {
            observer.on_progress(assembler.progress());
        }
    }

    let response = assembler.finish();
    debug!(
        "Stream complete: {} chars, {} audio fragments",
        response.full_text.len(),
        response.audio_fragments.len()
    );
    Ok(response)
}

async fn next_fragment<S>(fragments: &mut S, idle_timeout: Option<Duration>) -> Result<Option<ResponseFragment>>
where
    S: Stream<Item = Result<ResponseFragment>> + Unpin,
{
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, fragments.next())
            .await
            .map_err(|_| LlmError::Timeout(limit))?,
        None => fragments.next().await,
    };
    next.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn ok_stream(fragments: Vec<ResponseFragment>) -> impl Stream<Item = Result<ResponseFragment>> {
        stream::iter(fragments.into_iter().map(Ok))
    }

    #[derive(Default)]
    struct Recorder {
        texts: Vec<String>,
        progress: Vec<u8>,
    }

    impl ResponseObserver for Recorder {
        fn on_text(&mut self, text: &str) {
            self.texts.push(text.to_string());
        }

        fn on_progress(&mut self, progress: StreamProgress) {
            self.progress.push(progress.percent);
        }
    }

    #[tokio::test]
    async fn test_text_concatenated_in_order() {
        let fragments = vec![
            ResponseFragment::text("Hel"),
            ResponseFragment::audio(["QQ=="]),
            ResponseFragment::text("lo"),
            ResponseFragment::Delta {
                text: Some(", world".to_string()),
                audio: vec!["Qg==".to_string()],
            },
        ];
        let mut recorder = Recorder::default();
        let response = assemble(ok_stream(fragments), 128, &mut recorder, None).await.unwrap();

        assert_eq!(response.full_text, "Hello, world");
        assert_eq!(recorder.texts, vec!["Hel", "Hello", "Hello, world"]);
    }

    #[tokio::test]
    async fn test_audio_fragments_flattened_in_order() {
        let fragments = vec![
            ResponseFragment::audio(["a1", "a2"]),
            ResponseFragment::audio(Vec::<String>::new()),
            ResponseFragment::text("x"),
            ResponseFragment::audio(["b1"]),
        ];
        let response = assemble(ok_stream(fragments), 128, &mut (), None).await.unwrap();
        assert_eq!(response.audio_fragments, vec!["a1", "a2", "b1"]);
        assert!(response.has_audio());
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let response = assemble(ok_stream(vec![]), 128, &mut (), None).await.unwrap();
        assert_eq!(response, AssembledResponse::default());
        assert!(!response.has_audio());
    }

    #[tokio::test]
    async fn test_metadata_fragment_leaves_content_unchanged() {
        let mut assembler = ResponseAssembler::new(10);
        assembler.push(ResponseFragment::text("kept"));
        assert_eq!(assembler.push(ResponseFragment::Metadata), None);
        assert_eq!(assembler.text(), "kept");
        assert_eq!(assembler.progress().fragments_seen, 2);

        let mut recorder = Recorder::default();
        let fragments = vec![ResponseFragment::Metadata, ResponseFragment::text("a"), ResponseFragment::Metadata];
        let response = assemble(ok_stream(fragments), 10, &mut recorder, None).await.unwrap();
        assert_eq!(response.full_text, "a");
        assert!(response.audio_fragments.is_empty());
        // The leading metadata chunk still advances the estimate; it is just not reported.
        assert_eq!(recorder.progress, vec![20]);
    }

    #[tokio::test]
    async fn test_closure_observer_and_progress_cap() {
        let mut seen = Vec::new();
        let fragments = vec![ResponseFragment::text("a"), ResponseFragment::text("b"), ResponseFragment::text("c")];
        {
            let mut observer = |text: &str| seen.push(text.to_string());
            assemble(ok_stream(fragments), 2, &mut observer, None).await.unwrap();
        }
        assert_eq!(seen, vec!["a", "ab", "abc"]);

        let mut assembler = ResponseAssembler::new(2);
        for _ in 0..5 {
            assembler.push(ResponseFragment::text("t"));
        }
        assert_eq!(assembler.progress().percent, 100);
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let items: Vec<Result<ResponseFragment>> = vec![
            Ok(ResponseFragment::text("partial")),
            Err(LlmError::Decode("bad".to_string())),
            Ok(ResponseFragment::text("never")),
        ];
        let result = assemble(stream::iter(items), 128, &mut (), None).await;
        assert!(matches!(result, Err(LlmError::Decode(_))));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let stalled = stream::iter(vec![Ok::<_, LlmError>(ResponseFragment::text("a"))]).chain(stream::pending());
        let result = assemble(stalled, 128, &mut (), Some(Duration::from_millis(20))).await;
        match result {
            Err(LlmError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(20)),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
