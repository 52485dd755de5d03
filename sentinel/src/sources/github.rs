use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::http::HttpSettings;
use super::SourceClient;
use crate::artifact::{date_stamp, render_items, Category, ListStyle, RawItem};
use crate::error::{Result, SentinelError};
use crate::subscriptions::{validate_identifier, RepoProbe};

const PER_PAGE: usize = 100;
const PER_PAGE_PARAM: &str = "100";

/// Login shown when GitHub reports no user (deleted accounts).
const GHOST_LOGIN: &str = "ghost";

/// Activity window for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoActivityParams {
    pub repo: String,
    pub days: u32,
}

impl RepoActivityParams {
    pub fn new(repo: &str, days: u32) -> Result<Self> {
        let repo = validate_identifier(repo)?;
        if days == 0 {
            return Err(SentinelError::Validation("day window must be at least 1".to_string()));
        }
        Ok(Self { repo, days })
    }

    /// `owner_repo_{days}d`. Owners cannot contain `_`, so the name is unambiguous.
    fn file_stem(&self) -> String {
        format!("{}_{}d", self.repo.replacen('/', "_", 1), self.days)
    }
}

/// Commits, issues and pull requests from the GitHub REST API.
pub struct GithubClient {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(settings: &HttpSettings, api_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: settings.build_client()?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        debug!(%url, "github request");
        let response = self.get(path).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SentinelError::from_status(status, &url));
        }
        response.json::<T>().await.map_err(|e| SentinelError::body(&url, e))
    }

    /// Only the first page is read; a full page means older activity was cut.
    fn warn_if_truncated(endpoint: &str, repo: &str, count: usize) -> bool {
        let truncated = count >= PER_PAGE;
        if truncated {
            warn!(repo, endpoint, count, "page is full, older activity in the window is not included");
        }
        truncated
    }

    async fn fetch_commits(&self, repo: &str, since: &str) -> Result<Vec<RawItem>> {
        let commits: Vec<CommitJson> = self
            .get_json(&format!("/repos/{}/commits", repo), &[("since", since), ("per_page", PER_PAGE_PARAM)])
            .await?;
        Self::warn_if_truncated("commits", repo, commits.len());
        Ok(commits
            .into_iter()
            .map(|c| {
                let headline = c.commit.message.lines().next().unwrap_or_default().to_string();
                let author = c.commit.author.as_ref().and_then(|a| a.name.clone()).unwrap_or_default();
                let short_sha: String = c.sha.chars().take(7).collect();
                RawItem::new(headline, c.html_url)
                    .published(c.commit.author.and_then(|a| a.date))
                    .in_section("Commits")
                    .with_detail(format!("{} by {}", short_sha, author))
            })
            .collect())
    }

    /// The issues endpoint also lists pull requests; those are dropped here.
    async fn fetch_issues(&self, repo: &str, since: &str) -> Result<Vec<RawItem>> {
        let issues: Vec<IssueJson> = self
            .get_json(
                &format!("/repos/{}/issues", repo),
                &[("state", "all"), ("since", since), ("per_page", PER_PAGE_PARAM)],
            )
            .await?;
        Self::warn_if_truncated("issues", repo, issues.len());
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(|i| {
                RawItem::new(i.title, i.html_url)
                    .published(i.updated_at)
                    .in_section("Issues")
                    .with_detail(format!("#{} {} by {}", i.number, i.state, login(&i.user)))
            })
            .collect())
    }

    /// The pulls endpoint has no `since` filter, so results are sorted by
    /// update time and cut client-side.
    async fn fetch_pulls(&self, repo: &str, since: DateTime<Utc>) -> Result<Vec<RawItem>> {
        let pulls: Vec<PullJson> = self
            .get_json(
                &format!("/repos/{}/pulls", repo),
                &[("state", "all"), ("sort", "updated"), ("direction", "desc"), ("per_page", PER_PAGE_PARAM)],
            )
            .await?;
        Self::warn_if_truncated("pulls", repo, pulls.len());
        Ok(pulls
            .into_iter()
            .filter(|p| p.updated_at.map(|u| u >= since).unwrap_or(false))
            .map(|p| {
                let state = if p.merged_at.is_some() { "merged" } else { p.state.as_str() };
                RawItem::new(p.title.clone(), p.html_url.clone())
                    .published(p.updated_at)
                    .in_section("Pull Requests")
                    .with_detail(format!("#{} {} by {}", p.number, state, login(&p.user)))
            })
            .collect())
    }
}

#[async_trait]
impl SourceClient for GithubClient {
    type Params = RepoActivityParams;

    fn category(&self) -> Category {
        Category::RepoActivity
    }

    async fn fetch(&self, params: &RepoActivityParams) -> Result<Vec<RawItem>> {
        let since = Utc::now() - Duration::days(i64::from(params.days));
        let since_str = since.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut items = self.fetch_commits(&params.repo, &since_str).await?;
        items.extend(self.fetch_issues(&params.repo, &since_str).await?);
        items.extend(self.fetch_pulls(&params.repo, since).await?);

        info!(repo = %params.repo, days = params.days, items = items.len(), "fetched repository activity");
        Ok(items)
    }

    fn artifact_subpath(&self, params: &RepoActivityParams, now: &DateTime<Local>) -> PathBuf {
        PathBuf::from(date_stamp(now)).join(format!("{}.md", params.file_stem()))
    }

    fn render(&self, params: &RepoActivityParams, items: &[RawItem], now: &DateTime<Local>) -> String {
        let since = (*now - Duration::days(i64::from(params.days))).format("%Y-%m-%d");
        let heading = format!("Progress for {} ({} to {})", params.repo, since, date_stamp(now));
        render_items(&heading, items, ListStyle::Linked)
    }
}

#[async_trait]
impl RepoProbe for GithubClient {
    async fn probe(&self, repo: &str) -> Result<()> {
        let url = format!("{}/repos/{}", self.api_url, repo);
        let response = self.get(&format!("/repos/{}", repo)).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SentinelError::from_status(status, &url))
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommitJson {
    sha: String,
    html_url: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct UserJson {
    login: String,
}

fn login(user: &Option<UserJson>) -> &str {
    user.as_ref().map(|u| u.login.as_str()).unwrap_or(GHOST_LOGIN)
}

#[derive(Debug, Deserialize)]
struct IssueJson {
    number: u64,
    title: String,
    html_url: String,
    state: String,
    user: Option<UserJson>,
    updated_at: Option<DateTime<Utc>>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PullJson {
    number: u64,
    title: String,
    html_url: String,
    state: String,
    user: Option<UserJson>,
    updated_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_validate_and_name_files() {
        let p = RepoActivityParams::new("rust-lang/rust", 3).unwrap();
        assert_eq!(p.file_stem(), "rust-lang_rust_3d");
        assert!(RepoActivityParams::new("rust-lang/rust", 0).is_err());
        assert!(RepoActivityParams::new("not a repo", 1).is_err());
    }

    #[test]
    fn full_page_is_flagged() {
        assert!(!GithubClient::warn_if_truncated("commits", "o/r", 99));
        assert!(GithubClient::warn_if_truncated("commits", "o/r", 100));
    }

    #[test]
    fn missing_user_renders_as_ghost() {
        let issue: IssueJson = serde_json::from_str(
            r#"{"number":1,"title":"t","html_url":"u","state":"open","user":null}"#,
        )
        .unwrap();
        assert_eq!(login(&issue.user), "ghost");
    }

    #[test]
    fn distinct_windows_get_distinct_paths() {
        let client = GithubClient::new(&HttpSettings::default(), "http://localhost", None).unwrap();
        let now = Local::now();
        let one = client.artifact_subpath(&RepoActivityParams::new("o/r", 1).unwrap(), &now);
        let seven = client.artifact_subpath(&RepoActivityParams::new("o/r", 7).unwrap(), &now);
        assert_ne!(one, seven);
        assert!(one.starts_with(date_stamp(&now)));
    }
}
