use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::http::{parse_base, HttpSettings};
use super::SourceClient;
use crate::artifact::{date_stamp, render_items, time_stamp, Category, ListStyle, RawItem};
use crate::error::{Result, SentinelError};

pub const MAX_PAGE: u32 = 5;
pub const MAX_LIMIT: u32 = 50;
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(60);
const MAX_LISTED_AUTHORS: usize = 3;

/// Topic search against the Web of Science starter API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographyQuery {
    pub query: String,
    pub page: u32,
    pub limit: u32,
}

impl BibliographyQuery {
    /// Page is clamped to `1..=5`, page size to `1..=50`.
    pub fn new(query: &str, page: u32, limit: u32) -> Result<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SentinelError::Validation("search query must not be empty".to_string()));
        }
        Ok(Self {
            query: query.to_string(),
            page: page.clamp(1, MAX_PAGE),
            limit: limit.clamp(1, MAX_LIMIT),
        })
    }
}

pub struct WosClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry_wait: Duration,
}

impl WosClient {
    pub fn new(settings: &HttpSettings, base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        parse_base(&base_url)?;
        Ok(Self {
            client: settings.build_client()?,
            base_url,
            api_key,
            retry_wait: DEFAULT_RETRY_WAIT,
        })
    }

    /// Override the pause before the single rate-limit retry.
    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    async fn send(&self, query: &BibliographyQuery) -> Result<reqwest::Response> {
        let url = format!("{}/documents", self.base_url);
        let mut req = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("q", format!("TS=({})", query.query)),
                ("limit", query.limit.to_string()),
                ("page", query.page.to_string()),
            ]);
        if let Some(key) = &self.api_key {
            req = req.header("X-ApiKey", key);
        }
        debug!(%url, query = %query.query, page = query.page, "bibliography request");
        Ok(req.send().await?)
    }

    /// One request, plus exactly one retry after a fixed wait when the first
    /// answer is HTTP 429. The wait is a tokio timer, so dropping the future
    /// cancels it.
    async fn search(&self, query: &BibliographyQuery) -> Result<WosResponse> {
        let mut response = self.send(query).await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!(wait_secs = self.retry_wait.as_secs(), "bibliography API rate limited, retrying once");
            tokio::time::sleep(self.retry_wait).await;
            response = self.send(query).await?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                return Err(SentinelError::Network(format!(
                    "{}/documents still rate limited after retry",
                    self.base_url
                )));
            }
        }

        let url = format!("{}/documents", self.base_url);
        let status = response.status();
        if !status.is_success() {
            return Err(SentinelError::from_status(status, &url));
        }
        response
            .json::<WosResponse>()
            .await
            .map_err(|e| SentinelError::body(&url, e))
    }
}

fn hit_to_item(hit: WosHit) -> Option<RawItem> {
    let title = hit.title.filter(|t| !t.trim().is_empty())?;

    let link = hit
        .links
        .and_then(|l| l.record)
        .or_else(|| {
            hit.identifiers
                .and_then(|i| i.doi)
                .map(|doi| format!("https://doi.org/{}", doi))
        })
        .unwrap_or_else(|| {
            format!(
                "https://www.webofscience.com/wos/woscc/full-record/{}",
                hit.uid.unwrap_or_default()
            )
        });

    let authors: Vec<String> = hit
        .names
        .map(|n| n.authors.into_iter().filter_map(|a| a.display_name).collect())
        .unwrap_or_default();
    let mut detail = authors
        .iter()
        .take(MAX_LISTED_AUTHORS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > MAX_LISTED_AUTHORS {
        detail.push_str(" et al.");
    }
    if let Some(source) = hit.source {
        let venue = match (source.source_title, source.publish_year) {
            (Some(t), Some(y)) => format!("{} ({})", t, y),
            (Some(t), None) => t,
            (None, Some(y)) => y.to_string(),
            (None, None) => String::new(),
        };
        if !venue.is_empty() {
            if !detail.is_empty() {
                detail.push_str(" - ");
            }
            detail.push_str(&venue);
        }
    }

    Some(RawItem::new(title, link).with_detail(detail))
}

#[async_trait]
impl SourceClient for WosClient {
    type Params = BibliographyQuery;

    fn category(&self) -> Category {
        Category::Bibliography
    }

    async fn fetch(&self, query: &BibliographyQuery) -> Result<Vec<RawItem>> {
        let response = self.search(query).await?;
        let total = response.metadata.and_then(|m| m.total);
        let items: Vec<RawItem> = response.hits.into_iter().filter_map(hit_to_item).collect();
        info!(query = %query.query, total, returned = items.len(), "fetched bibliography results");
        Ok(items)
    }

    fn artifact_subpath(&self, _query: &BibliographyQuery, now: &DateTime<Local>) -> PathBuf {
        PathBuf::from(date_stamp(now)).join(format!("{}.md", time_stamp(now)))
    }

    fn render(&self, query: &BibliographyQuery, items: &[RawItem], now: &DateTime<Local>) -> String {
        let heading = format!(
            "Web of Science: {} (page {}, {} {})",
            query.query,
            query.page,
            date_stamp(now),
            now.format("%H:%M:%S")
        );
        render_items(&heading, items, ListStyle::Linked)
    }
}

#[derive(Debug, Deserialize)]
struct WosResponse {
    metadata: Option<WosMetadata>,
    #[serde(default)]
    hits: Vec<WosHit>,
}

#[derive(Debug, Deserialize)]
struct WosMetadata {
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WosHit {
    uid: Option<String>,
    title: Option<String>,
    source: Option<WosSource>,
    names: Option<WosNames>,
    links: Option<WosLinks>,
    identifiers: Option<WosIdentifiers>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WosSource {
    source_title: Option<String>,
    publish_year: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WosNames {
    #[serde(default)]
    authors: Vec<WosAuthor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WosAuthor {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WosLinks {
    record: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WosIdentifiers {
    doi: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_clamped() {
        let q = BibliographyQuery::new("  graphene ", 9, 500).unwrap();
        assert_eq!(q.query, "graphene");
        assert_eq!(q.page, MAX_PAGE);
        assert_eq!(q.limit, MAX_LIMIT);

        let q = BibliographyQuery::new("graphene", 0, 0).unwrap();
        assert_eq!((q.page, q.limit), (1, 1));

        assert!(matches!(
            BibliographyQuery::new("   ", 1, 10),
            Err(SentinelError::Validation(_))
        ));
    }

    #[test]
    fn hits_map_to_items() {
        let body = r#"{
            "metadata": {"total": 2, "page": 1, "limit": 10},
            "hits": [
                {
                    "uid": "WOS:1",
                    "title": "Graphene transistors",
                    "source": {"sourceTitle": "Nature", "publishYear": 2021},
                    "names": {"authors": [
                        {"displayName": "Li, A"}, {"displayName": "Wang, B"},
                        {"displayName": "Zhao, C"}, {"displayName": "Sun, D"}
                    ]},
                    "links": {"record": "https://www.webofscience.com/wos/woscc/full-record/WOS:1"}
                },
                {
                    "uid": "WOS:2",
                    "title": "Untitled follow-up",
                    "identifiers": {"doi": "10.1000/xyz"}
                },
                {"uid": "WOS:3"}
            ]
        }"#;
        let response: WosResponse = serde_json::from_str(body).unwrap();
        let items: Vec<RawItem> = response.hits.into_iter().filter_map(hit_to_item).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link, "https://www.webofscience.com/wos/woscc/full-record/WOS:1");
        assert_eq!(
            items[0].detail.as_deref(),
            Some("Li, A, Wang, B, Zhao, C et al. - Nature (2021)")
        );
        assert_eq!(items[1].link, "https://doi.org/10.1000/xyz");
        assert!(items[1].detail.is_none());
    }
}
