use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArticleRecord, NotificationId, VersionRecord};

/// Durable record of every article that has been seen.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn get_by_id(&self, article_id: &str) -> Result<Option<ArticleRecord>>;

    /// Insert a new article. Fails if the id is already present.
    async fn create(&self, record: &ArticleRecord) -> Result<()>;

    /// Idempotent upsert of the notification thread anchor.
    async fn set_thread_anchor(&self, article_id: &str, anchor: &NotificationId) -> Result<()>;
}

/// Append-only history of article snapshots.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Append a snapshot. `record.version` must be exactly one past the
    /// current latest version (or 1 for the first snapshot).
    async fn append(&self, record: &VersionRecord) -> Result<()>;

    /// The snapshot with the highest version number.
    async fn latest(&self, article_id: &str) -> Result<Option<VersionRecord>>;

    /// Number of stored snapshots of `article_id` whose hash equals `content_hash`.
    async fn count_matching_hash(&self, article_id: &str, content_hash: &str) -> Result<u64>;
}
