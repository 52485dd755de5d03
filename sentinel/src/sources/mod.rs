//! Upstream sources.
//!
//! Every upstream implements [`SourceClient`]: `fetch` talks to the network and
//! parses items, `export` turns a non-empty fetch into a markdown artifact.
//! Transient fetch failures and empty results never produce a file; they come
//! back as [`SkipReason`] so the caller can decide what to do.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::artifact::{Artifact, ArtifactStore, Category, RawItem};
use crate::error::{Result, SentinelError};

pub mod baidu_news;
pub mod github;
pub mod hacker_news;
pub mod http;
pub mod wos;

pub use baidu_news::{BaiduNewsClient, NewsMode};
pub use github::{GithubClient, RepoActivityParams};
pub use hacker_news::HackerNewsClient;
pub use http::HttpSettings;
pub use wos::{BibliographyQuery, WosClient};

/// Why an export produced no artifact.
#[derive(Debug)]
pub enum SkipReason {
    /// The upstream answered but yielded zero items
    NoData,
    /// A transient failure (network, timeout, rate limit, missing resource)
    FetchFailed(SentinelError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => f.write_str("no items found"),
            SkipReason::FetchFailed(e) => write!(f, "fetch failed: {}", e),
        }
    }
}

#[derive(Debug)]
pub enum ExportOutcome {
    Exported(Artifact),
    Skipped(SkipReason),
}

impl ExportOutcome {
    pub fn into_artifact(self) -> Option<Artifact> {
        match self {
            ExportOutcome::Exported(a) => Some(a),
            ExportOutcome::Skipped(_) => None,
        }
    }
}

#[async_trait]
pub trait SourceClient: Send + Sync {
    type Params: Send + Sync;

    fn category(&self) -> Category;

    /// Query the upstream and parse its items.
    async fn fetch(&self, params: &Self::Params) -> Result<Vec<RawItem>>;

    /// Artifact location below the category directory, e.g. `2024-05-01/10-00-00.md`.
    fn artifact_subpath(&self, params: &Self::Params, now: &DateTime<Local>) -> PathBuf;

    fn render(&self, params: &Self::Params, items: &[RawItem], now: &DateTime<Local>) -> String;

    async fn export(&self, store: &ArtifactStore, params: &Self::Params) -> Result<ExportOutcome> {
        let category = self.category();
        let items = match self.fetch(params).await {
            Ok(items) => items,
            Err(e) if e.is_transient() => {
                warn!(%category, error = %e, "fetch failed, no artifact produced");
                return Ok(ExportOutcome::Skipped(SkipReason::FetchFailed(e)));
            }
            Err(e) => return Err(e),
        };

        if items.is_empty() {
            warn!(%category, "no items found, no artifact produced");
            return Ok(ExportOutcome::Skipped(SkipReason::NoData));
        }

        let now = Local::now();
        let content = self.render(params, &items, &now);
        let subpath = self.artifact_subpath(params, &now);
        let path = store.write(category, &subpath, &content).await?;
        info!(%category, items = items.len(), path = %path.display(), "export complete");

        Ok(ExportOutcome::Exported(Artifact {
            path,
            category,
            created_at: now,
            content,
        }))
    }
}
