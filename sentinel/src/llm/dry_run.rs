use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{ChatBackend, ChatMessage, LlmResponse, UsageMetadata};
use crate::artifact::write_file;
use crate::error::Result;

/// Returned in place of a summary when no backend is called.
pub const DRY_RUN_SENTINEL: &str = "DRY RUN";

/// Writes the assembled prompt to a diagnostics file instead of calling a model.
pub struct DryRunBackend {
    prompt_file: PathBuf,
}

impl DryRunBackend {
    pub fn new(prompt_file: impl AsRef<Path>) -> Self {
        Self {
            prompt_file: prompt_file.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ChatBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        write_file(&self.prompt_file, &prompt).await?;
        info!(path = %self.prompt_file.display(), "dry run, prompt saved");

        Ok(LlmResponse {
            content: DRY_RUN_SENTINEL.to_string(),
            usage: UsageMetadata::default(),
            model: "dry-run".to_string(),
        })
    }
}
