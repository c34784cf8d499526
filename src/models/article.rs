use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use thiserror::Error;

use super::ArticleFields;

/// Prefix of the synthetic ids handed out in dry-run mode.
pub const DRY_RUN_ID_PREFIX: &str = "dry-run-";

/// Identifier the notification service assigned to a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id was made up by the dry-run notifier.
    pub fn is_dry_run(&self) -> bool {
        self.0.starts_with(DRY_RUN_ID_PREFIX)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the article was last seen. New articles start on `home`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArticleStatus {
    #[default]
    Home,
    Tracked,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Home => "home",
            ArticleStatus::Tracked => "tracked",
        }
    }
}

#[derive(Error, Debug)]
#[error("unknown article status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ArticleStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(ArticleStatus::Home),
            "tracked" => Ok(ArticleStatus::Tracked),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One tracked article. Only `thread_anchor_id` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub article_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub status: ArticleStatus,
    pub thread_anchor_id: Option<NotificationId>,
}

impl ArticleRecord {
    pub fn new(article_id: impl Into<String>, first_seen_at: DateTime<Utc>) -> Self {
        Self {
            article_id: article_id.into(),
            first_seen_at,
            status: ArticleStatus::Home,
            thread_anchor_id: None,
        }
    }
}

/// An article as it appears in the current poll, already sanitised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedArticle {
    pub article_id: String,
    pub fields: ArticleFields,
    pub observed_at: DateTime<Utc>,
}
