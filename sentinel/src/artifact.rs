use chrono::{DateTime, Local, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::{Result, SentinelError};

/// Report category. Each one owns a directory under the output root
/// and a prompt profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    RepoActivity,
    SocialNews,
    News,
    Bibliography,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::RepoActivity,
        Category::SocialNews,
        Category::News,
        Category::Bibliography,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Category::RepoActivity => "github",
            Category::SocialNews => "hacker_news",
            Category::News => "baidu_news",
            Category::Bibliography => "wos",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Category {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" | "repo-activity" | "repo_activity" => Ok(Category::RepoActivity),
            "hacker_news" | "hacker-news" | "social-news" | "social_news" => Ok(Category::SocialNews),
            "baidu_news" | "news" => Ok(Category::News),
            "wos" | "bibliography" => Ok(Category::Bibliography),
            other => Err(SentinelError::Validation(format!("unknown report category '{}'", other))),
        }
    }
}

/// One upstream item, as produced by a source's parse step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Grouping label for sources that aggregate several endpoints
    pub section: Option<String>,
    /// Secondary line (authors, journal, commit author)
    pub detail: Option<String>,
}

impl RawItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at: None,
            section: None,
            detail: None,
        }
    }

    pub fn published(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.published_at = at;
        self
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.trim().is_empty() {
            self.detail = Some(detail);
        }
        self
    }
}

/// How each numbered entry is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    /// `N. [title](link)`
    Linked,
    /// `N. title  Link: link`
    Inline,
}

/// Serialize items as a numbered markdown list under `heading`.
/// Numbering restarts whenever the item section changes.
pub fn render_items(heading: &str, items: &[RawItem], style: ListStyle) -> String {
    let mut out = format!("# {}\n\n", heading);
    let mut current_section: Option<&str> = None;
    let mut n = 0;

    for item in items {
        let section = item.section.as_deref();
        if section.is_some() && section != current_section {
            if n > 0 {
                out.push('\n');
            }
            out.push_str(&format!("## {}\n\n", section.unwrap_or_default()));
            current_section = section;
            n = 0;
        }
        n += 1;

        let title = collapse_whitespace(&item.title);
        match style {
            ListStyle::Linked => out.push_str(&format!("{}. [{}]({})\n", n, title, item.link)),
            ListStyle::Inline => out.push_str(&format!("{}. {}  Link: {}\n", n, title, item.link)),
        }
        if let Some(secondary) = secondary_line(item) {
            out.push_str(&format!("   {}\n", secondary));
        }
    }
    out
}

/// Detail text followed by the publication time, when either is known.
fn secondary_line(item: &RawItem) -> Option<String> {
    let published = item.published_at.map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string());
    match (item.detail.as_deref(), published) {
        (Some(detail), Some(at)) => Some(format!("{} ({})", collapse_whitespace(detail), at)),
        (Some(detail), None) => Some(collapse_whitespace(detail)),
        (None, Some(at)) => Some(at),
        (None, None) => None,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A normalized snapshot written to disk for one invocation.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub category: Category,
    pub created_at: DateTime<Local>,
    pub content: String,
}

/// `YYYY-MM-DD` directory component.
pub fn date_stamp(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// `HH-MM-SS` file name component.
pub fn time_stamp(at: &DateTime<Local>) -> String {
    at.format("%H-%M-%S").to_string()
}

/// Map an artifact path to its report path: `x.md` becomes `x_report.md`.
///
/// Any other name keeps its full file name and gets `.report.md`
/// (`x` -> `x.report.md`, `x.txt` -> `x.txt.report.md`). Markdown reports
/// always end in `_report.md` and the others never do, so distinct
/// artifacts never share a report.
pub fn derive_report_path(artifact_path: &Path) -> PathBuf {
    let file_name = |p: &Path| p.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match artifact_path.extension().and_then(|e| e.to_str()) {
        Some("md") => format!(
            "{}_report.md",
            artifact_path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default()
        ),
        _ => format!("{}.report.md", file_name(artifact_path)),
    };
    artifact_path.with_file_name(name)
}

/// Path construction and file IO under one output root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/{category}/{subpath}`
    pub fn path_for(&self, category: Category, subpath: &Path) -> PathBuf {
        self.root.join(category.dir_name()).join(subpath)
    }

    /// Create parent directories and write `content`, replacing any previous file.
    pub async fn write(&self, category: Category, subpath: &Path, content: &str) -> Result<PathBuf> {
        let path = self.path_for(category, subpath);
        write_file(&path, content).await?;
        info!(path = %path.display(), category = %category, "artifact written");
        Ok(path)
    }
}

pub(crate) async fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SentinelError::io(parent, e))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| SentinelError::io(path, e))
}
