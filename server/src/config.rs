// Configuration constants for the server

use std::time::Duration;

use llm_core::VoicePreset;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    /// Longest wait for the first byte or the next fragment of a reply.
    pub llm_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub default_max_tokens: u32,
    pub default_voice_preset: VoicePreset,
    pub max_body_bytes: usize,
    /// Conversations kept in memory; the least recently used is dropped first.
    pub max_conversations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            rate_limit_per_minute: 60,
            llm_timeout_secs: 120,
            request_timeout_secs: 180,
            cors_allowed_origins: None,
            default_max_tokens: llm_core::request::DEFAULT_MAX_TOKENS,
            default_voice_preset: VoicePreset::default(),
            max_body_bytes: 25 * 1024 * 1024,
            max_conversations: 1000,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let rate_limit_per_minute = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_per_minute);

        let llm_timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.llm_timeout_secs);

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        let default_max_tokens = std::env::var("DEFAULT_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.default_max_tokens);

        let default_voice_preset = std::env::var("DEFAULT_VOICE_PRESET")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.default_voice_preset);

        let max_body_bytes = std::env::var("MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_body_bytes);

        let max_conversations = std::env::var("MAX_CONVERSATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_conversations);

        Self {
            port,
            rate_limit_per_minute,
            llm_timeout_secs,
            request_timeout_secs,
            cors_allowed_origins,
            default_max_tokens,
            default_voice_preset,
            max_body_bytes,
            max_conversations,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}
