//! System prompts, one profile per report category.
//!
//! Built-in prompts are compiled in; a prompts directory may override any of
//! them with `{category}.txt` (for example `hacker_news.txt`).

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::ChatMessage;
use crate::artifact::Category;
use crate::error::{Result, SentinelError};

fn builtin_prompt(category: Category) -> &'static str {
    match category {
        Category::RepoActivity => include_str!("../../prompts/github.txt"),
        Category::SocialNews => include_str!("../../prompts/hacker_news.txt"),
        Category::News => include_str!("../../prompts/baidu_news.txt"),
        Category::Bibliography => include_str!("../../prompts/wos.txt"),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Prompts {
    overrides: HashMap<Category, String>,
}

impl Prompts {
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Read overrides from `dir`. Missing files fall back to the built-in prompt.
    pub async fn load(dir: Option<&Path>) -> Result<Self> {
        let mut prompts = Self::default();
        let Some(dir) = dir else {
            return Ok(prompts);
        };

        for category in Category::ALL {
            let path = dir.join(format!("{}.txt", category.dir_name()));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(%category, path = %path.display(), "using prompt override");
                    prompts.overrides.insert(category, text);
                }
                Ok(_) => debug!(path = %path.display(), "empty prompt override ignored"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SentinelError::io(&path, e)),
            }
        }
        Ok(prompts)
    }

    pub fn system_prompt(&self, category: Category) -> &str {
        self.overrides
            .get(&category)
            .map(String::as_str)
            .unwrap_or_else(|| builtin_prompt(category))
    }

    /// System prompt for `category` followed by the artifact as the user turn.
    pub fn assemble(&self, category: Category, content: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt(category).trim()),
            ChatMessage::user(format!("Here is the latest content:\n\n{}", content)),
        ]
    }
}
