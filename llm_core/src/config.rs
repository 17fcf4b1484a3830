// Connection settings for the hosted chat-completion endpoint

use crate::error::{LlmError, Result};

pub const DEFAULT_BASE_URL: &str = "https://llama3-1-405b.lepton.run/api/v1/";
pub const DEFAULT_MODEL: &str = "llama3.1-405b";
pub const API_TOKEN_VAR: &str = "LEPTON_API_TOKEN";

#[derive(Clone)]
pub struct LlmConfig {
    pub api_token: String,
    pub base_url: String,
    pub model: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Read settings from the environment. A missing or blank
    /// `LEPTON_API_TOKEN` is a configuration error, not a panic.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = lookup(API_TOKEN_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                LlmError::Configuration(format!("{API_TOKEN_VAR} not found in environment variables"))
            })?;

        let base_url = lookup("LEPTON_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let model = lookup("LLM_MODEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_token,
            base_url,
            model,
        })
    }

    /// Full URL of the chat-completions route, tolerant of a trailing slash.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
