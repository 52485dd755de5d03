use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::Client;
use std::path::PathBuf;
use tracing::info;
use url::Url;

use super::http::{get_text, parse_base, resolve_link, selector, HttpSettings};
use super::SourceClient;
use crate::artifact::{date_stamp, render_items, time_stamp, Category, ListStyle, RawItem};
use crate::error::Result;

/// Front-page scraper for Hacker News.
pub struct HackerNewsClient {
    client: Client,
    url: String,
}

impl HackerNewsClient {
    pub fn new(settings: &HttpSettings, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        parse_base(&url)?;
        Ok(Self {
            client: settings.build_client()?,
            url,
        })
    }
}

/// Parse story rows (`tr.athing`) from a front page.
/// Rows without a `span.titleline` link are skipped.
pub fn parse_front_page(html: &str, base: &Url) -> Result<Vec<RawItem>> {
    let document = scraper::Html::parse_document(html);
    let row_sel = selector("tr.athing")?;
    let link_sel = selector("span.titleline > a")?;

    let stories = document
        .select(&row_sel)
        .filter_map(|row| {
            let anchor = row.select(&link_sel).next()?;
            let href = anchor.value().attr("href")?;
            let title = anchor.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                return None;
            }
            Some(RawItem::new(title, resolve_link(base, href)))
        })
        .collect();
    Ok(stories)
}

#[async_trait]
impl SourceClient for HackerNewsClient {
    type Params = ();

    fn category(&self) -> Category {
        Category::SocialNews
    }

    async fn fetch(&self, _params: &()) -> Result<Vec<RawItem>> {
        let html = get_text(&self.client, &self.url).await?;
        let stories = parse_front_page(&html, &parse_base(&self.url)?)?;
        info!(count = stories.len(), "parsed hacker news front page");
        Ok(stories)
    }

    /// One file per second so repeated runs on the same day never collide.
    fn artifact_subpath(&self, _params: &(), now: &DateTime<Local>) -> PathBuf {
        PathBuf::from(date_stamp(now)).join(format!("{}.md", time_stamp(now)))
    }

    fn render(&self, _params: &(), items: &[RawItem], now: &DateTime<Local>) -> String {
        let heading = format!("Hacker News Top Stories ({} {})", date_stamp(now), now.format("%H:%M:%S"));
        render_items(&heading, items, ListStyle::Inline)
    }
}
