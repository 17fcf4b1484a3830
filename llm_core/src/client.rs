use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::request::ChatRequest;
use crate::stream::{fragment_stream, FragmentStream};

/// A remote endpoint that answers a chat request with a fragment stream.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model name placed in outbound requests.
    fn model(&self) -> &str;

    /// Start a streaming completion. Errors before the first byte (connect
    /// failures, non-2xx status) are returned here; errors mid-stream arrive
    /// as items of the returned stream.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<FragmentStream>;
}

/// OpenAI-compatible client for the Lepton-hosted endpoint.
pub struct LeptonClient {
    config: LlmConfig,
    client: Client,
}

impl LeptonClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_token.trim().is_empty() {
            return Err(LlmError::Configuration("API token must not be empty".to_string()));
        }
        let client = Client::builder().build()?;
        Ok(Self { config, client })
    }

    /// Build a client from `LEPTON_API_TOKEN` and friends.
    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env()?)
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl ChatBackend for LeptonClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<FragmentStream> {
        let url = self.config.completions_url();
        debug!(
            "POST {} (max_tokens={}, audio={})",
            url,
            request.max_tokens,
            request.tts.is_some()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("Chat completion rejected with status {}", status);
            return Err(LlmError::Api { status, message });
        }

        Ok(fragment_stream(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_rejected() {
        let result = LeptonClient::new(LlmConfig::new("  "));
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_model_from_config() {
        let mut config = LlmConfig::new("token");
        config.model = "custom-model".to_string();
        let client = LeptonClient::new(config).unwrap();
        assert_eq!(client.model(), "custom-model");
        assert!(client.config().completions_url().ends_with("/chat/completions"));
    }
}
