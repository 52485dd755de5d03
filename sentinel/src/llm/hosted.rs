use async_trait::async_trait;

use super::chat::ChatClient;
use super::{BackendConfig, ChatBackend, ChatMessage, LlmResponse};
use crate::error::{Result, SentinelError};

/// OpenAI-compatible hosted API. Refuses to build without a credential.
pub struct HostedBackend {
    chat: ChatClient,
}

impl HostedBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if config.credential.is_none() {
            return Err(SentinelError::Validation(
                "hosted backend requires an API key (set the variable named by llm.openai.api_key_env)".to_string(),
            ));
        }
        Ok(Self {
            chat: ChatClient::new("hosted", config)?,
        })
    }
}

#[async_trait]
impl ChatBackend for HostedBackend {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        self.chat.complete(messages).await
    }
}
