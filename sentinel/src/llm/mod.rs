//! Summarization backends.
//!
//! [`LlmBackend`] owns one resolved [`BackendConfig`]: a hosted or local chat
//! endpoint (or the dry-run stub) plus the prompt profiles. It is built fresh
//! for each report, so nothing about the backend is shared between requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::artifact::Category;
use crate::error::{Result, SentinelError};

pub mod chat;
pub mod dry_run;
pub mod hosted;
pub mod local;
pub mod prompts;

pub use dry_run::{DryRunBackend, DRY_RUN_SENTINEL};
pub use hosted::HostedBackend;
pub use local::LocalBackend;
pub use prompts::Prompts;

const DEFAULT_HOSTED_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LOCAL_MODEL: &str = "llama3";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Core trait for chat-completion backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Variant name recorded on reports and errors
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response from a chat completion
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI-compatible hosted API, credential required
    Hosted,
    /// Self-hosted endpoint such as Ollama
    Local,
}

impl Provider {
    pub fn name(self) -> &'static str {
        match self {
            Provider::Hosted => "hosted",
            Provider::Local => "local",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "hosted" => Ok(Provider::Hosted),
            "ollama" | "local" => Ok(Provider::Local),
            other => Err(SentinelError::Validation(format!(
                "unknown backend provider '{}' (expected openai or ollama)",
                other
            ))),
        }
    }
}

/// Everything needed to build one backend. Immutable once resolved.
#[derive(Clone)]
pub struct BackendConfig {
    pub provider: Provider,
    pub model: String,
    pub endpoint: String,
    pub credential: Option<String>,
    pub timeout: Duration,
    /// Retry a transient failure once after `retry_delay`
    pub retry: bool,
    pub retry_delay: Duration,
    pub dry_run: bool,
    /// Where dry runs leave the assembled prompt
    pub dry_run_file: PathBuf,
    pub prompts_dir: Option<PathBuf>,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("dry_run", &self.dry_run)
            .field("dry_run_file", &self.dry_run_file)
            .field("prompts_dir", &self.prompts_dir)
            .finish()
    }
}

impl BackendConfig {
    pub fn new(provider: Provider, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            endpoint: endpoint.into(),
            credential: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: false,
            retry_delay: DEFAULT_RETRY_DELAY,
            dry_run: false,
            dry_run_file: PathBuf::from("daily_progress").join("prompt.txt"),
            prompts_dir: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, delay: Duration) -> Self {
        self.retry = true;
        self.retry_delay = delay;
        self
    }

    pub fn with_dry_run(mut self, prompt_file: impl Into<PathBuf>) -> Self {
        self.dry_run = true;
        self.dry_run_file = prompt_file.into();
        self
    }

    pub fn with_prompts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompts_dir = Some(dir.into());
        self
    }

    /// Resolve the backend described by `[llm]`. `provider` and `model` override
    /// the configured values for this invocation only.
    pub fn from_config(
        config: &common::Config,
        provider: Option<Provider>,
        model: Option<&str>,
    ) -> Result<Self> {
        let llm = config.llm.clone().unwrap_or_default();
        let provider = match provider {
            Some(p) => p,
            None => llm.model_type.as_deref().unwrap_or("openai").parse()?,
        };

        let (remote, default_url, default_model, default_key_env) = match provider {
            Provider::Hosted => (
                llm.openai.clone(),
                common::DEFAULT_OPENAI_API_URL,
                DEFAULT_HOSTED_MODEL,
                "OPENAI_API_KEY",
            ),
            Provider::Local => (
                llm.ollama.clone(),
                common::DEFAULT_OLLAMA_API_URL,
                DEFAULT_LOCAL_MODEL,
                "OLLAMA_API_KEY",
            ),
        };
        let remote = remote.unwrap_or_default();

        let model = model
            .map(str::to_string)
            .or(remote.model.clone())
            .unwrap_or_else(|| default_model.to_string());
        let endpoint = remote.api_url.clone().unwrap_or_else(|| default_url.to_string());

        let mut cfg = BackendConfig::new(provider, endpoint, model);
        cfg.credential = common::resolve_secret(remote.api_key_env.as_deref().or(Some(default_key_env)));
        if let Some(secs) = remote.timeout_seconds {
            cfg.timeout = Duration::from_secs(secs);
        }
        cfg.retry = llm.retry.unwrap_or(false);
        cfg.dry_run = llm.dry_run.unwrap_or(false);
        cfg.dry_run_file = config.diagnostics_dir().join("prompt.txt");
        cfg.prompts_dir = llm.prompts_dir.map(PathBuf::from);
        Ok(cfg)
    }
}

/// A resolved backend plus the prompt profiles it summarizes with.
pub struct LlmBackend {
    backend: Box<dyn ChatBackend>,
    prompts: Prompts,
    retry: bool,
    retry_delay: Duration,
}

impl LlmBackend {
    pub async fn from_config(config: &BackendConfig) -> Result<Self> {
        let backend: Box<dyn ChatBackend> = if config.dry_run {
            Box::new(DryRunBackend::new(&config.dry_run_file))
        } else {
            match config.provider {
                Provider::Hosted => Box::new(HostedBackend::new(config)?),
                Provider::Local => Box::new(LocalBackend::new(config)?),
            }
        };
        let prompts = Prompts::load(config.prompts_dir.as_deref()).await?;
        info!(backend = backend.name(), model = %config.model, "summarization backend ready");

        Ok(Self {
            backend,
            prompts,
            retry: config.retry,
            retry_delay: config.retry_delay,
        })
    }

    /// Wrap an already-built backend, using the built-in prompts.
    pub fn with_backend(backend: Box<dyn ChatBackend>) -> Self {
        Self {
            backend,
            prompts: Prompts::builtin(),
            retry: false,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Summarize `content` with the system prompt for `category`.
    /// Every failure comes back as [`SentinelError::Backend`].
    pub async fn summarize(&self, category: Category, content: &str) -> Result<String> {
        let messages = self.prompts.assemble(category, content);

        let mut result = self.backend.complete(&messages).await;
        if let Err(e) = &result {
            if self.retry && e.is_transient() {
                warn!(backend = self.name(), error = %e, "backend call failed, retrying once");
                tokio::time::sleep(self.retry_delay).await;
                result = self.backend.complete(&messages).await;
            }
        }

        match result {
            Ok(response) => {
                info!(
                    backend = self.name(),
                    model = %response.model,
                    total_tokens = response.usage.total_tokens,
                    "summary generated"
                );
                Ok(response.content)
            }
            Err(e @ SentinelError::Backend { .. }) => Err(e),
            Err(e) => Err(SentinelError::backend(self.name(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_aliases() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::Hosted);
        assert_eq!("Ollama".parse::<Provider>().unwrap(), Provider::Local);
        assert!("claude".parse::<Provider>().is_err());
    }

    #[test]
    fn debug_output_redacts_credential() {
        let cfg = BackendConfig::new(Provider::Hosted, "http://x", "m").with_credential("sk-secret");
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn from_config_applies_overrides() {
        let toml = r#"
            [llm]
            model_type = "ollama"
            retry = true

            [llm.ollama]
            api_url = "http://gpu-box:11434/api/chat"
            model = "qwen2"

            [output]
            diagnostics_dir = "diag"
        "#;
        let config: common::Config = toml::from_str(toml).unwrap();

        let cfg = BackendConfig::from_config(&config, None, None).unwrap();
        assert_eq!(cfg.provider, Provider::Local);
        assert_eq!(cfg.model, "qwen2");
        assert_eq!(cfg.endpoint, "http://gpu-box:11434/api/chat");
        assert!(cfg.retry);
        assert_eq!(cfg.dry_run_file, PathBuf::from("diag").join("prompt.txt"));

        let cfg = BackendConfig::from_config(&config, Some(Provider::Local), Some("mistral")).unwrap();
        assert_eq!(cfg.model, "mistral");

        let cfg = BackendConfig::from_config(&config, Some(Provider::Hosted), None).unwrap();
        assert_eq!(cfg.endpoint, common::DEFAULT_OPENAI_API_URL);
        assert_eq!(cfg.model, DEFAULT_HOSTED_MODEL);
    }
}
