use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::Client;
use scraper::Html;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};
use url::Url;

use super::http::{get_text, parse_base, resolve_link, selector, HttpSettings};
use super::SourceClient;
use crate::artifact::{date_stamp, render_items, time_stamp, Category, ListStyle, RawItem};
use crate::error::{Result, SentinelError};

/// Which part of the front page to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsMode {
    Breaking,
    Latest,
    /// Breaking followed by latest, without deduplication
    All,
}

impl NewsMode {
    pub fn slug(self) -> &'static str {
        match self {
            NewsMode::Breaking => "breaking",
            NewsMode::Latest => "latest",
            NewsMode::All => "all",
        }
    }
}

impl fmt::Display for NewsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for NewsMode {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breaking" | "hot" | "hot_news" => Ok(NewsMode::Breaking),
            "latest" | "latest_news" => Ok(NewsMode::Latest),
            "all" => Ok(NewsMode::All),
            other => Err(SentinelError::Validation(format!("unknown news mode '{}'", other))),
        }
    }
}

/// Front-page scraper for Baidu News.
pub struct BaiduNewsClient {
    client: Client,
    url: String,
}

impl BaiduNewsClient {
    pub fn new(settings: &HttpSettings, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        parse_base(&url)?;
        Ok(Self {
            client: settings.build_client()?,
            url,
        })
    }
}

/// Parse the sections selected by `mode`. A missing section container is a
/// [`SentinelError::Parse`]: it means the page layout changed.
pub fn parse_news_page(html: &str, mode: NewsMode, base: &Url) -> Result<Vec<RawItem>> {
    let document = Html::parse_document(html);
    match mode {
        NewsMode::Breaking => parse_breaking(&document, base),
        NewsMode::Latest => parse_latest(&document, base),
        NewsMode::All => {
            let mut items: Vec<RawItem> = parse_breaking(&document, base)?
                .into_iter()
                .map(|i| i.in_section("Breaking"))
                .collect();
            items.extend(
                parse_latest(&document, base)?
                    .into_iter()
                    .map(|i| i.in_section("Latest")),
            );
            Ok(items)
        }
    }
}

fn parse_breaking(document: &Html, base: &Url) -> Result<Vec<RawItem>> {
    let section_sel = selector("div.hotnews")?;
    let link_sel = selector("a")?;
    let section = document
        .select(&section_sel)
        .next()
        .ok_or_else(|| SentinelError::Parse("breaking news section (div.hotnews) not found".to_string()))?;

    let items: Vec<RawItem> = section
        .select(&link_sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let title = a.text().collect::<String>().trim().to_string();
            (!title.is_empty()).then(|| RawItem::new(title, resolve_link(base, href)))
        })
        .collect();
    info!(count = items.len(), "parsed breaking news");
    Ok(items)
}

fn parse_latest(document: &Html, base: &Url) -> Result<Vec<RawItem>> {
    let list_sel = selector("ul.ulist.focuslistnews")?;
    let item_sel = selector("li")?;
    let link_sel = selector("a")?;

    let lists: Vec<_> = document.select(&list_sel).collect();
    if lists.is_empty() {
        return Err(SentinelError::Parse(
            "latest news section (ul.ulist.focuslistnews) not found".to_string(),
        ));
    }

    let mut items = Vec::new();
    for list in lists {
        for li in list.select(&item_sel) {
            let Some(href) = li.select(&link_sel).next().and_then(|a| a.value().attr("href")) else {
                debug!("skipping latest news entry without a link");
                continue;
            };
            let title = li.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                items.push(RawItem::new(title, resolve_link(base, href)));
            }
        }
    }
    info!(count = items.len(), "parsed latest news");
    Ok(items)
}

#[async_trait]
impl SourceClient for BaiduNewsClient {
    type Params = NewsMode;

    fn category(&self) -> Category {
        Category::News
    }

    async fn fetch(&self, mode: &NewsMode) -> Result<Vec<RawItem>> {
        let html = get_text(&self.client, &self.url).await?;
        parse_news_page(&html, *mode, &parse_base(&self.url)?)
    }

    fn artifact_subpath(&self, mode: &NewsMode, now: &DateTime<Local>) -> PathBuf {
        PathBuf::from(date_stamp(now)).join(format!("{}-{}.md", mode.slug(), time_stamp(now)))
    }

    fn render(&self, mode: &NewsMode, items: &[RawItem], now: &DateTime<Local>) -> String {
        let heading = format!("{} ({} {})", mode.slug(), date_stamp(now), now.format("%H:%M:%S"));
        render_items(&heading, items, ListStyle::Linked)
    }
}
