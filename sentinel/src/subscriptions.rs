//! Persisted registry of watched `owner/repo` identifiers.
//!
//! The backing file is a JSON array rewritten in full after every mutation.
//! Mutations are read-modify-write and are not atomic: callers must keep a
//! single writer per file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::artifact::write_file;
use crate::error::{Result, SentinelError};

/// Existence check run before an identifier is committed.
#[async_trait]
pub trait RepoProbe: Send + Sync {
    async fn probe(&self, repo: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

/// Check the `owner/repo` shape and return the trimmed identifier.
///
/// Owners are alphanumeric with inner hyphens; repository names may also
/// contain `_` and `.`.
pub fn validate_identifier(identifier: &str) -> Result<String> {
    let id = identifier.trim();
    let invalid = || SentinelError::Validation(format!("'{}' is not of the form owner/repo", identifier));

    let (owner, repo) = id.split_once('/').ok_or_else(invalid)?;
    let owner_ok = !owner.is_empty()
        && owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !owner.starts_with('-')
        && !owner.ends_with('-');
    let repo_ok = !repo.is_empty()
        && repo != "."
        && repo != ".."
        && repo.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if owner_ok && repo_ok {
        Ok(id.to_string())
    } else {
        Err(invalid())
    }
}

pub struct SubscriptionRegistry {
    path: PathBuf,
    probe: Arc<dyn RepoProbe>,
}

impl SubscriptionRegistry {
    pub fn new(path: impl Into<PathBuf>, probe: Arc<dyn RepoProbe>) -> Self {
        Self {
            path: path.into(),
            probe,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current entries in insertion order. A missing file is an empty registry.
    pub async fn list(&self) -> Result<Vec<String>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SentinelError::io(&self.path, e)),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<String> = serde_json::from_str(&data).map_err(|e| {
            SentinelError::Parse(format!("subscriptions file {}: {}", self.path.display(), e))
        })?;

        // Hand-edited files may carry duplicates; keep the first occurrence.
        let mut unique: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !contains(&unique, &entry) {
                unique.push(entry);
            }
        }
        Ok(unique)
    }

    pub async fn add(&self, identifier: &str) -> Result<AddOutcome> {
        let id = validate_identifier(identifier)?;
        let mut entries = self.list().await?;
        if contains(&entries, &id) {
            info!(repo = %id, "subscription already present");
            return Ok(AddOutcome::AlreadyPresent);
        }

        // An unreachable or rate-limited upstream cannot confirm the repository either.
        if let Err(e) = self.probe.probe(&id).await {
            warn!(repo = %id, error = %e, "repository probe failed, subscription not added");
            return Err(SentinelError::NotFound(format!("repository {} ({})", id, e)));
        }

        entries.push(id.clone());
        self.save(&entries).await?;
        info!(repo = %id, "subscription added");
        Ok(AddOutcome::Added)
    }

    pub async fn remove(&self, identifier: &str) -> Result<RemoveOutcome> {
        let id = identifier.trim();
        let mut entries = self.list().await?;
        let before = entries.len();
        entries.retain(|e| !e.eq_ignore_ascii_case(id));
        if entries.len() == before {
            info!(repo = %id, "subscription not present, nothing removed");
            return Ok(RemoveOutcome::NotPresent);
        }

        self.save(&entries).await?;
        info!(repo = %id, "subscription removed");
        Ok(RemoveOutcome::Removed)
    }

    async fn save(&self, entries: &[String]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| SentinelError::Parse(format!("failed to serialize subscriptions: {}", e)))?;
        write_file(&self.path, &json).await
    }
}

/// GitHub identifiers are case-insensitive.
fn contains(entries: &[String], id: &str) -> bool {
    entries.iter().any(|e| e.eq_ignore_ascii_case(id))
}
