//! Fetch → artifact → report, dispatched on a tagged request.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::artifact::{ArtifactStore, Category};
use crate::error::Result;
use crate::llm::BackendConfig;
use crate::report::{Report, ReportGenerator};
use crate::sources::{
    BaiduNewsClient, BibliographyQuery, ExportOutcome, GithubClient, HackerNewsClient, HttpSettings,
    NewsMode, RepoActivityParams, SkipReason, SourceClient, WosClient,
};
use crate::subscriptions::SubscriptionRegistry;

/// One unit of work for one upstream.
#[derive(Debug, Clone)]
pub enum SourceRequest {
    RepoActivity(RepoActivityParams),
    SocialNews,
    News(NewsMode),
    Bibliography(BibliographyQuery),
}

impl SourceRequest {
    pub fn category(&self) -> Category {
        match self {
            SourceRequest::RepoActivity(_) => Category::RepoActivity,
            SourceRequest::SocialNews => Category::SocialNews,
            SourceRequest::News(_) => Category::News,
            SourceRequest::Bibliography(_) => Category::Bibliography,
        }
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Reported(Report),
    /// No artifact was produced, so nothing was summarized
    Skipped(SkipReason),
}

/// The four upstream clients.
pub struct Sources {
    pub github: Arc<GithubClient>,
    pub hacker_news: HackerNewsClient,
    pub news: BaiduNewsClient,
    pub wos: WosClient,
}

impl Sources {
    pub fn from_config(config: &common::Config) -> Result<Self> {
        let http = HttpSettings::from_config(config);
        Ok(Self {
            github: Arc::new(GithubClient::new(&http, config.github_api_url(), config.github_token())?),
            hacker_news: HackerNewsClient::new(&http, config.hacker_news_url())?,
            news: BaiduNewsClient::new(&http, config.baidu_news_url())?,
            wos: WosClient::new(&http, config.wos_api_url(), config.wos_api_key())?,
        })
    }
}

pub struct Pipeline {
    store: ArtifactStore,
    sources: Sources,
    registry: SubscriptionRegistry,
}

impl Pipeline {
    /// The registry probes repositories through the GitHub client.
    pub fn new(store: ArtifactStore, sources: Sources, subscriptions_file: impl Into<PathBuf>) -> Self {
        let registry = SubscriptionRegistry::new(subscriptions_file, sources.github.clone());
        Self {
            store,
            sources,
            registry,
        }
    }

    pub fn from_config(config: &common::Config) -> Result<Self> {
        Ok(Self::new(
            ArtifactStore::new(config.output_root()),
            Sources::from_config(config)?,
            config.subscriptions_file(),
        ))
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub async fn export(&self, request: &SourceRequest) -> Result<ExportOutcome> {
        match request {
            SourceRequest::RepoActivity(params) => self.sources.github.export(&self.store, params).await,
            SourceRequest::SocialNews => self.sources.hacker_news.export(&self.store, &()).await,
            SourceRequest::News(mode) => self.sources.news.export(&self.store, mode).await,
            SourceRequest::Bibliography(query) => self.sources.wos.export(&self.store, query).await,
        }
    }

    /// Export, then summarize the artifact with a backend built for this run.
    pub async fn run(&self, request: &SourceRequest, backend: &BackendConfig) -> Result<PipelineOutcome> {
        let artifact = match self.export(request).await? {
            ExportOutcome::Exported(artifact) => artifact,
            ExportOutcome::Skipped(reason) => {
                info!(category = %request.category(), %reason, "no artifact, report skipped");
                return Ok(PipelineOutcome::Skipped(reason));
            }
        };

        let generator = ReportGenerator::from_config(backend).await?;
        let report = generator.generate(&artifact.path, artifact.category).await?;
        Ok(PipelineOutcome::Reported(report))
    }

    /// Run the repo-activity report for every subscription in order.
    /// A failing repository is logged and does not stop the others.
    pub async fn run_subscriptions(
        &self,
        days: u32,
        backend: &BackendConfig,
    ) -> Result<Vec<(String, Result<PipelineOutcome>)>> {
        let repos = self.registry.list().await?;
        if repos.is_empty() {
            warn!(file = %self.registry.path().display(), "no subscriptions registered");
        }

        let mut results = Vec::with_capacity(repos.len());
        for repo in repos {
            let outcome = match RepoActivityParams::new(&repo, days) {
                Ok(params) => self.run(&SourceRequest::RepoActivity(params), backend).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &outcome {
                error!(%repo, error = %e, "progress report failed");
            }
            results.push((repo, outcome));
        }
        Ok(results)
    }
}
