/*!
common/src/lib.rs

Shared configuration types and helpers for Sentinel.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges an override file over a defaults file
- Secret resolution from environment variables named in the config
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_HACKER_NEWS_URL: &str = "https://news.ycombinator.com/";
pub const DEFAULT_BAIDU_NEWS_URL: &str = "https://news.baidu.com/";
pub const DEFAULT_WOS_API_URL: &str = "https://api.clarivate.com/apis/wos-starter/v1";
pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OLLAMA_API_URL: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_USER_AGENT: &str = "Sentinel/0.1.0";

/// Code-host (GitHub) section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API token
    pub token_env: Option<String>,
    /// Path to the JSON subscriptions file
    pub subscriptions_file: Option<String>,
    /// Days between scheduled progress reports, and the default report window
    pub progress_frequency_days: Option<u32>,
}

/// Scheduler (daemon run times) configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Wall-clock times in "HH:MM" 24h format when the daemon runs
    #[serde(default)]
    pub times: Vec<String>,
}

/// Politeness / fetching configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolitenessConfig {
    pub fetch_timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

/// One chat-completion endpoint (hosted or self-hosted)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// LLM top-level config grouping the provider specifics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model_type: Option<String>, // "openai", "ollama"
    pub openai: Option<RemoteLlmConfig>,
    pub ollama: Option<RemoteLlmConfig>,
    /// Retry a failed backend call once
    pub retry: Option<bool>,
    pub dry_run: Option<bool>,
    /// Directory holding `{profile}.txt` system prompt overrides
    pub prompts_dir: Option<String>,
}

/// Upstream endpoints for the scraped and searched sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub hacker_news_url: Option<String>,
    pub baidu_news_url: Option<String>,
    pub wos_api_url: Option<String>,
    pub wos_api_key_env: Option<String>,
}

/// Where artifacts, reports and diagnostics land
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub root: Option<String>,
    pub diagnostics_dir: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub politeness: Option<PolitenessConfig>,
    pub llm: Option<LlmConfig>,
    pub sources: Option<SourcesConfig>,
    pub output: Option<OutputConfig>,
    #[serde(default)]
    pub report_types: Vec<String>,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject URLs and schedule entries that cannot be used later on.
    pub fn validate(&self) -> Result<()> {
        let mut urls: Vec<(&str, &str)> = vec![("github.api_url", self.github_api_url())];
        if let Some(sources) = &self.sources {
            for (name, value) in [
                ("sources.hacker_news_url", &sources.hacker_news_url),
                ("sources.baidu_news_url", &sources.baidu_news_url),
                ("sources.wos_api_url", &sources.wos_api_url),
            ] {
                if let Some(v) = value {
                    urls.push((name, v.as_str()));
                }
            }
        }
        if let Some(llm) = &self.llm {
            for (name, remote) in [("llm.openai.api_url", &llm.openai), ("llm.ollama.api_url", &llm.ollama)] {
                if let Some(url) = remote.as_ref().and_then(|r| r.api_url.as_deref()) {
                    urls.push((name, url));
                }
            }
            if let Some(model_type) = llm.model_type.as_deref() {
                let known = ["openai", "hosted", "ollama", "local"];
                if !known.contains(&model_type.trim().to_ascii_lowercase().as_str()) {
                    anyhow::bail!("Unknown llm.model_type '{}' (expected openai or ollama)", model_type);
                }
            }
        }
        for (name, value) in urls {
            url::Url::parse(value).with_context(|| format!("Invalid URL for {}: {}", name, value))?;
        }

        for time in &self.scheduler.times {
            parse_clock_time(time).with_context(|| format!("Invalid scheduler time '{}'", time))?;
        }
        Ok(())
    }

    pub fn github_api_url(&self) -> &str {
        self.github.api_url.as_deref().unwrap_or(DEFAULT_GITHUB_API_URL)
    }

    pub fn github_token(&self) -> Option<String> {
        resolve_secret(self.github.token_env.as_deref().or(Some("GITHUB_TOKEN")))
    }

    pub fn subscriptions_file(&self) -> PathBuf {
        PathBuf::from(self.github.subscriptions_file.as_deref().unwrap_or("subscriptions.json"))
    }

    pub fn progress_frequency_days(&self) -> u32 {
        self.github.progress_frequency_days.unwrap_or(1).max(1)
    }

    pub fn fetch_timeout(&self) -> Duration {
        let secs = self
            .politeness
            .as_ref()
            .and_then(|p| p.fetch_timeout_seconds)
            .unwrap_or(15);
        Duration::from_secs(secs)
    }

    pub fn user_agent(&self) -> &str {
        self.politeness
            .as_ref()
            .and_then(|p| p.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn hacker_news_url(&self) -> &str {
        self.sources
            .as_ref()
            .and_then(|s| s.hacker_news_url.as_deref())
            .unwrap_or(DEFAULT_HACKER_NEWS_URL)
    }

    pub fn baidu_news_url(&self) -> &str {
        self.sources
            .as_ref()
            .and_then(|s| s.baidu_news_url.as_deref())
            .unwrap_or(DEFAULT_BAIDU_NEWS_URL)
    }

    pub fn wos_api_url(&self) -> &str {
        self.sources
            .as_ref()
            .and_then(|s| s.wos_api_url.as_deref())
            .unwrap_or(DEFAULT_WOS_API_URL)
    }

    pub fn wos_api_key(&self) -> Option<String> {
        let env = self
            .sources
            .as_ref()
            .and_then(|s| s.wos_api_key_env.as_deref())
            .unwrap_or("WOS_API_KEY");
        resolve_secret(Some(env))
    }

    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(
            self.output
                .as_ref()
                .and_then(|o| o.root.as_deref())
                .unwrap_or("daily_progress"),
        )
    }

    /// Directory for diagnostics such as the dry-run prompt dump.
    /// Falls back to the output root.
    pub fn diagnostics_dir(&self) -> PathBuf {
        self.output
            .as_ref()
            .and_then(|o| o.diagnostics_dir.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.output_root())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Read a secret from the environment variable `env_name`.
/// Unset and empty variables both resolve to `None`.
pub fn resolve_secret(env_name: Option<&str>) -> Option<String> {
    let name = env_name?;
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a "HH:MM" 24h clock time into (hour, minute).
pub fn parse_clock_time(value: &str) -> Result<(u32, u32)> {
    let (h, m) = value
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected HH:MM"))?;
    let hour: u32 = h.trim().parse().context("hour is not a number")?;
    let minute: u32 = m.trim().parse().context("minute is not a number")?;
    if hour > 23 || minute > 59 {
        anyhow::bail!("clock time out of range: {}", value);
    }
    Ok((hour, minute))
}
