use crate::db::{ArticleStore, VersionStore};
use crate::error::Result;
use crate::models::{ArticleRecord, ObservedArticle, TrackedField, VersionRecord};

use super::fingerprint;

/// Outcome of comparing an observed article with what the store holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// First sighting; version 1 was recorded.
    New { version: VersionRecord },
    /// Content matches some stored version exactly. Nothing was written.
    Unchanged,
    /// Content is new for this article; `current` was appended after `baseline`.
    Changed {
        baseline: VersionRecord,
        current: VersionRecord,
        changed_fields: Vec<TrackedField>,
    },
}

impl Detection {
    pub fn label(&self) -> &'static str {
        match self {
            Detection::New { .. } => "new",
            Detection::Unchanged => "unchanged",
            Detection::Changed { .. } => "changed",
        }
    }
}

/// Classifies observed articles and records new versions.
///
/// Classification only looks at the store, so a failed notification later
/// on can never cause the same change to be detected twice.
pub struct ChangeDetector<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> ChangeDetector<'a, S>
where
    S: ArticleStore + VersionStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn classify(&self, article: &ObservedArticle) -> Result<Detection> {
        let article_id = article.article_id.as_str();
        let content_hash = fingerprint(&article.fields);

        if self.store.get_by_id(article_id).await?.is_none() {
            self.store
                .create(&ArticleRecord::new(article_id, article.observed_at))
                .await?;
            let version = self.record_version(article, 1, content_hash).await?;
            tracing::info!("New article tracked: {}", article.fields.url);
            return Ok(Detection::New { version });
        }

        let matches = self
            .store
            .count_matching_hash(article_id, &content_hash)
            .await?;
        if matches > 0 {
            tracing::debug!("Article {} unchanged ({} matching versions)", article_id, matches);
            return Ok(Detection::Unchanged);
        }

        let Some(baseline) = self.store.latest(article_id).await? else {
            // Article row committed but version 1 never did
            tracing::warn!("Article {} has no stored versions, recording version 1", article_id);
            let version = self.record_version(article, 1, content_hash).await?;
            return Ok(Detection::New { version });
        };

        let changed_fields = baseline.fields.changed_fields(&article.fields);
        if changed_fields.is_empty() {
            tracing::warn!(
                "Article {} hash changed with no tracked field difference",
                article_id
            );
        }

        let current = self
            .record_version(article, baseline.version + 1, content_hash)
            .await?;
        tracing::info!(
            "Article {} changed: version {} -> {} ({:?})",
            article_id,
            baseline.version,
            current.version,
            changed_fields
        );

        Ok(Detection::Changed {
            baseline,
            current,
            changed_fields,
        })
    }

    async fn record_version(
        &self,
        article: &ObservedArticle,
        version: u32,
        content_hash: String,
    ) -> Result<VersionRecord> {
        let record = VersionRecord {
            article_id: article.article_id.clone(),
            version,
            fields: article.fields.clone(),
            content_hash,
            recorded_at: article.observed_at,
        };
        self.store.append(&record).await?;
        Ok(record)
    }
}
