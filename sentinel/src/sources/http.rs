use reqwest::Client;
use scraper::Selector;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Result, SentinelError};

/// Timeout and user agent shared by every upstream client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: common::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpSettings {
    pub fn from_config(config: &common::Config) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            user_agent: config.user_agent().to_string(),
        }
    }

    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| SentinelError::Network(format!("failed to build HTTP client: {}", e)))
    }
}

/// GET `url` and return the body, mapping non-success statuses into the taxonomy.
pub(crate) async fn get_text(client: &Client, url: &str) -> Result<String> {
    debug!(url, "fetching page");
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SentinelError::from_status(status, url));
    }
    Ok(response.text().await?)
}

pub(crate) fn parse_base(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| SentinelError::Validation(format!("invalid URL {}: {}", url, e)))
}

/// Resolve a relative href against the page it was found on.
/// Absolute hrefs are kept verbatim.
pub(crate) fn resolve_link(base: &Url, href: &str) -> String {
    let href = href.trim();
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SentinelError::Parse(format!("invalid selector '{}': {:?}", css, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_resolve_against_page() {
        let base = Url::parse("https://news.ycombinator.com/").unwrap();
        assert_eq!(resolve_link(&base, "item?id=1"), "https://news.ycombinator.com/item?id=1");
        assert_eq!(resolve_link(&base, "https://x/"), "https://x/");
        assert_eq!(resolve_link(&base, " http://news1 "), "http://news1");
    }
}
