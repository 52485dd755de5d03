use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::artifact::{derive_report_path, write_file, Category};
use crate::error::{Result, SentinelError};
use crate::llm::{BackendConfig, LlmBackend};

/// Summary written next to its artifact.
#[derive(Debug, Clone)]
pub struct Report {
    pub source_artifact: PathBuf,
    pub category: Category,
    /// Backend variant that produced the content
    pub backend: String,
    pub content: String,
    pub path: PathBuf,
}

/// Turns artifacts into reports with one backend.
pub struct ReportGenerator {
    backend: LlmBackend,
}

impl ReportGenerator {
    pub fn new(backend: LlmBackend) -> Self {
        Self { backend }
    }

    pub async fn from_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(LlmBackend::from_config(config).await?))
    }

    /// Read the artifact, summarize it with the `category` prompt and write
    /// the result to the derived report path. Nothing is written on failure.
    pub async fn generate(&self, artifact_path: &Path, category: Category) -> Result<Report> {
        let content = tokio::fs::read_to_string(artifact_path)
            .await
            .map_err(|e| SentinelError::io(artifact_path, e))?;

        let summary = match self.backend.summarize(category, &content).await {
            Ok(s) => s,
            Err(e) => {
                error!(artifact = %artifact_path.display(), error = %e, "summarization failed");
                return Err(e);
            }
        };

        let path = derive_report_path(artifact_path);
        write_file(&path, &summary).await?;
        info!(%category, path = %path.display(), backend = self.backend.name(), "report written");

        Ok(Report {
            source_artifact: artifact_path.to_path_buf(),
            category,
            backend: self.backend.name().to_string(),
            content: summary,
            path,
        })
    }
}

/// One-shot report with a fresh backend built from `config`.
pub async fn generate_report(artifact_path: &Path, config: &BackendConfig, category: Category) -> Result<Report> {
    ReportGenerator::from_config(config)
        .await?
        .generate(artifact_path, category)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatBackend, ChatMessage, LlmResponse, UsageMetadata};
    use async_trait::async_trait;

    /// Echoes the system prompt's first line.
    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
            Ok(LlmResponse {
                content: messages[0].content.lines().next().unwrap_or_default().to_string(),
                usage: UsageMetadata::default(),
                model: "echo".to_string(),
            })
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ChatBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<LlmResponse> {
            Err(SentinelError::Network("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn report_lands_next_to_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("github/2024-05-01/octo_hello_1d.md");
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::write(&artifact, "# Progress\n\n1. [fix](http://c)\n").unwrap();

        let generator = ReportGenerator::new(LlmBackend::with_backend(Box::new(EchoBackend)));
        let report = generator.generate(&artifact, Category::RepoActivity).await.unwrap();

        assert_eq!(report.path, dir.path().join("github/2024-05-01/octo_hello_1d_report.md"));
        assert_eq!(report.backend, "echo");
        assert_eq!(std::fs::read_to_string(&report.path).unwrap(), report.content);
        assert!(report.content.contains("software engineer"));
    }

    #[tokio::test]
    async fn backend_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("a.md");
        std::fs::write(&artifact, "content").unwrap();

        let generator = ReportGenerator::new(LlmBackend::with_backend(Box::new(FailingBackend)));
        let err = generator.generate(&artifact, Category::News).await.unwrap_err();

        assert!(matches!(err, SentinelError::Backend { .. }));
        assert!(!dir.path().join("a_report.md").exists());
    }
}
