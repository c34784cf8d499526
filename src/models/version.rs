use chrono::{DateTime, Utc};

use super::ArticleFields;

/// Immutable snapshot of an article's tracked fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub article_id: String,
    pub version: u32,
    pub fields: ArticleFields,
    pub content_hash: String,
    pub recorded_at: DateTime<Utc>,
}
