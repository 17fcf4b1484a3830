//! Chat-completion core: request building, streamed response assembly and
//! conversation turns against a hosted OpenAI-compatible endpoint that can
//! answer with synthesized speech.

pub mod assembler;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod request;
pub mod stream;

pub use assembler::{assemble, AssembledResponse, ResponseAssembler, ResponseObserver, StreamProgress};
pub use client::{ChatBackend, LeptonClient};
pub use config::LlmConfig;
pub use conversation::{process_turn, ConversationLog, TurnResult};
pub use error::{LlmError, Result};
pub use request::{
    build_request, ChatMessage, ChatRequest, MessageContent, RequestOptions, Role, TurnInput, VoicePreset,
};
pub use stream::{fragment_stream, FragmentStream, ResponseFragment};
