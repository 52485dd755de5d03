use async_trait::async_trait;

use super::chat::ChatClient;
use super::{BackendConfig, ChatBackend, ChatMessage, LlmResponse};
use crate::error::Result;

/// Self-hosted endpoint. Works against Ollama's native `/api/chat` as well as
/// OpenAI-compatible servers; a credential is sent only when configured.
pub struct LocalBackend {
    chat: ChatClient,
}

impl LocalBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            chat: ChatClient::new("local", config)?.with_native_shape(),
        })
    }
}

#[async_trait]
impl ChatBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        self.chat.complete(messages).await
    }
}
