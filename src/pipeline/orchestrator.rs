use std::fmt;

use chrono::Utc;

use super::RetryPolicy;
use crate::db::{ArticleStore, VersionStore};
use crate::detect::{ChangeDetector, Detection};
use crate::error::Result;
use crate::feed::RawItem;
use crate::models::{ObservedArticle, TrackedField, VersionRecord};
use crate::notify::{NotificationThreader, Notifier};
use crate::render::Renderer;

/// Outcome counts for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub new: usize,
    pub unchanged: usize,
    pub changed: usize,
    /// Entries dropped before classification (no author, no id).
    pub skipped: usize,
    /// Entries whose processing hit an unexpected error.
    pub failed: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// Changed fields not notified because a value was empty or rendering failed.
    pub fields_skipped: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} unchanged, {} changed, {} skipped, {} failed; {} notifications sent, {} failed, {} fields skipped",
            self.new,
            self.unchanged,
            self.changed,
            self.skipped,
            self.failed,
            self.notifications_sent,
            self.notifications_failed,
            self.fields_skipped
        )
    }
}

/// Drives one poll cycle: classify every entry, then render and notify
/// each changed field.
///
/// Entries are processed one at a time and an entry's failure never stops
/// the cycle.
pub struct Pipeline<'a, S: ?Sized, N: ?Sized, R: ?Sized> {
    store: &'a S,
    notifier: &'a N,
    renderer: &'a R,
    retry: RetryPolicy,
}

impl<'a, S, N, R> Pipeline<'a, S, N, R>
where
    S: ArticleStore + VersionStore + ?Sized,
    N: Notifier + ?Sized,
    R: Renderer + ?Sized,
{
    pub fn new(store: &'a S, notifier: &'a N, renderer: &'a R, retry: RetryPolicy) -> Self {
        Self {
            store,
            notifier,
            renderer,
            retry,
        }
    }

    pub async fn run_cycle(&self, items: Vec<RawItem>) -> CycleReport {
        let mut report = CycleReport::default();

        if items.is_empty() {
            tracing::warn!("Empty feed, nothing to process");
            return report;
        }

        let observed_at = Utc::now();
        for item in items {
            let entry_id = item.id.clone();
            let article = match item.into_observed(observed_at) {
                Ok(article) => article,
                Err(e) => {
                    tracing::info!("Skipping entry '{}': {}", entry_id, e);
                    report.skipped += 1;
                    continue;
                }
            };

            match self.process(&article, &mut report).await {
                Ok(Detection::New { .. }) => report.new += 1,
                Ok(Detection::Unchanged) => report.unchanged += 1,
                Ok(Detection::Changed { .. }) => report.changed += 1,
                Err(e) => {
                    tracing::error!("Problem processing article {}: {}", article.article_id, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!("Cycle finished: {}", report);
        report
    }

    async fn process(&self, article: &ObservedArticle, report: &mut CycleReport) -> Result<Detection> {
        let detection = ChangeDetector::new(self.store).classify(article).await?;
        tracing::debug!("Article {} classified {}", article.article_id, detection.label());

        if let Detection::Changed {
            baseline,
            current,
            changed_fields,
        } = &detection
        {
            self.notify_changes(baseline, current, changed_fields, report)
                .await?;
        }

        Ok(detection)
    }

    /// Render and post one notification per changed field. The new version
    /// is already stored, so render and notify failures are counted and
    /// logged only. A store failure ends the item: without a recorded anchor
    /// the next field would open a second thread.
    async fn notify_changes(
        &self,
        baseline: &VersionRecord,
        current: &VersionRecord,
        changed_fields: &[TrackedField],
        report: &mut CycleReport,
    ) -> Result<()> {
        let threader = NotificationThreader::new(self.store, self.notifier, &self.retry);
        let renderer = self.renderer;

        for &field in changed_fields {
            let old = baseline.fields.get(field);
            let new = current.fields.get(field);

            if old.is_empty() || new.is_empty() {
                tracing::info!(
                    "Old or new {} empty for {}, not notifying",
                    field.key(),
                    current.article_id
                );
                report.fields_skipped += 1;
                continue;
            }

            let artifact = match self
                .retry
                .run("render diff", move || renderer.render(old, new))
                .await
            {
                Ok(artifact) => artifact,
                Err(e) => {
                    tracing::warn!(
                        "Could not render {} diff for {}: {}",
                        field.key(),
                        current.article_id,
                        e
                    );
                    report.fields_skipped += 1;
                    continue;
                }
            };

            match threader
                .notify(
                    &current.article_id,
                    &current.fields.url,
                    field.change_message(),
                    &artifact,
                )
                .await
            {
                Ok(id) => {
                    tracing::info!("Posted {} for {} as {}", field.change_message(), current.article_id, id);
                    report.notifications_sent += 1;
                }
                Err(e) if e.is_store_failure() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Notification '{}' for {} failed: {}",
                        field.change_message(),
                        current.article_id,
                        e
                    );
                    report.notifications_failed += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;

    use super::*;
    use crate::db::Repository;
    use crate::error::AppError;
    use crate::models::{ArticleRecord, NotificationId};
    use crate::notify::testing::RecordingNotifier;
    use crate::render::testing::FakeRenderer;

    fn raw(id: &str, title: &str, summary: &str, author: Option<&str>) -> RawItem {
        RawItem {
            id: id.into(),
            link: format!("https://example.com/{}", id),
            title: title.into(),
            summary: summary.into(),
            author: author.map(str::to_string),
        }
    }

    fn story(title: &str) -> RawItem {
        raw("story", title, "<p>Abstract</p>", Some("X"))
    }

    struct Harness {
        repo: Repository,
        notifier: RecordingNotifier,
        renderer: FakeRenderer,
    }

    impl Harness {
        async fn new() -> Self {
            Self {
                repo: Repository::open_in_memory().await.unwrap(),
                notifier: RecordingNotifier::default(),
                renderer: FakeRenderer::default(),
            }
        }

        async fn cycle(&self, items: Vec<RawItem>) -> CycleReport {
            Pipeline::new(&self.repo, &self.notifier, &self.renderer, RetryPolicy::no_retry())
                .run_cycle(items)
                .await
        }
    }

    #[tokio::test]
    async fn new_articles_are_recorded_silently() {
        let h = Harness::new().await;
        let report = h.cycle(vec![story("A"), raw("other", "B", "", Some("Y"))]).await;

        assert_eq!(report.new, 2);
        assert!(h.notifier.posts().is_empty());
        assert!(h.renderer.calls().is_empty());
    }

    #[tokio::test]
    async fn unchanged_rerun_posts_nothing() {
        let h = Harness::new().await;
        h.cycle(vec![story("A")]).await;
        let report = h.cycle(vec![story("A")]).await;

        assert_eq!(report, CycleReport { unchanged: 1, ..Default::default() });
        assert!(h.notifier.posts().is_empty());
        assert_eq!(h.repo.history("story").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn single_field_edit_posts_one_threaded_notification() {
        let h = Harness::new().await;
        h.cycle(vec![story("A")]).await;
        let report = h.cycle(vec![story("B")]).await;

        assert_eq!(report.changed, 1);
        assert_eq!(report.notifications_sent, 1);
        assert_eq!(h.renderer.calls(), vec![("A".to_string(), "B".to_string())]);
        assert_eq!(h.notifier.roots(), 1);

        let replies = h.notifier.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "Change in Headline");
    }

    #[tokio::test]
    async fn second_change_replies_without_new_root() {
        let h = Harness::new().await;
        h.cycle(vec![story("A")]).await;
        h.cycle(vec![story("B")]).await;
        let anchor = h
            .repo
            .get_by_id("story")
            .await
            .unwrap()
            .unwrap()
            .thread_anchor_id
            .unwrap();

        h.cycle(vec![story("C")]).await;

        assert_eq!(h.notifier.roots(), 1);
        let replies = h.notifier.replies();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].1, anchor);
    }

    #[tokio::test]
    async fn revert_is_not_reported() {
        let h = Harness::new().await;
        h.cycle(vec![story("A")]).await;
        h.cycle(vec![story("B")]).await;
        let report = h.cycle(vec![story("A")]).await;

        assert_eq!(report.unchanged, 1);
        assert_eq!(h.notifier.replies().len(), 1);
        let versions: Vec<u32> = h
            .repo
            .history("story")
            .await
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn fields_are_notified_in_declared_order() {
        let h = Harness::new().await;
        h.cycle(vec![raw("s", "A", "<p>One</p>", Some("X"))]).await;

        let mut edited = raw("s", "B", "<p>One</p>", Some("Y"));
        edited.link = "https://example.com/s-moved".into();
        h.cycle(vec![edited]).await;

        let messages: Vec<String> = h.notifier.replies().into_iter().map(|(text, _)| text).collect();
        assert_eq!(
            messages,
            vec!["Change in URL", "Change in Headline", "Change in Author"]
        );
        assert_eq!(h.notifier.roots(), 1);
    }

    #[tokio::test]
    async fn empty_side_of_a_change_is_skipped() {
        let h = Harness::new().await;
        h.cycle(vec![raw("s", "A", "", Some("X"))]).await;
        let report = h.cycle(vec![raw("s", "A", "<p>Now with abstract</p>", Some("X"))]).await;

        assert_eq!(report.changed, 1);
        assert_eq!(report.fields_skipped, 1);
        assert!(h.renderer.calls().is_empty());
        assert!(h.notifier.posts().is_empty());
        assert_eq!(h.repo.history("s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn entry_without_author_is_dropped() {
        let h = Harness::new().await;
        let report = h
            .cycle(vec![
                story("A"),
                raw("anonymous", "Wire copy", "", None),
                raw("other", "B", "", Some("Y")),
            ])
            .await;

        assert_eq!(report.new, 2);
        assert_eq!(report.skipped, 1);
        assert!(h.repo.get_by_id("anonymous").await.unwrap().is_none());
        assert!(h.repo.history("anonymous").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn render_failure_skips_field_but_keeps_version() {
        let h = Harness::new().await;
        h.cycle(vec![story("A")]).await;
        h.renderer.fail.store(true, Ordering::SeqCst);

        let report = h.cycle(vec![story("B")]).await;
        assert_eq!(report.changed, 1);
        assert_eq!(report.fields_skipped, 1);
        assert!(h.notifier.posts().is_empty());

        h.renderer.fail.store(false, Ordering::SeqCst);
        let report = h.cycle(vec![story("B")]).await;
        assert_eq!(report.unchanged, 1);
        assert!(h.notifier.posts().is_empty());
    }

    #[tokio::test]
    async fn notify_failure_is_not_redelivered() {
        let h = Harness::new().await;
        h.cycle(vec![story("A")]).await;
        h.notifier.fail_roots.store(true, Ordering::SeqCst);

        let report = h.cycle(vec![story("B")]).await;
        assert_eq!(report.changed, 1);
        assert_eq!(report.notifications_failed, 1);

        h.notifier.fail_roots.store(false, Ordering::SeqCst);
        let report = h.cycle(vec![story("B")]).await;
        assert_eq!(report.unchanged, 1);
        assert!(h.notifier.posts().is_empty());
    }

    #[tokio::test]
    async fn hash_only_change_records_version_and_posts_nothing() {
        let h = Harness::new().await;
        let article = story("A").into_observed(Utc::now()).unwrap();
        h.repo
            .create(&ArticleRecord::new("story", Utc::now()))
            .await
            .unwrap();
        h.repo
            .append(&VersionRecord {
                article_id: "story".into(),
                version: 1,
                fields: article.fields,
                content_hash: "digest-from-an-older-field-set".into(),
                recorded_at: Utc::now(),
            })
            .await
            .unwrap();

        let report = h.cycle(vec![story("A")]).await;

        assert_eq!(report.changed, 1);
        assert_eq!(report.notifications_sent, 0);
        assert!(h.renderer.calls().is_empty());
        assert!(h.notifier.posts().is_empty());
        assert_eq!(h.repo.history("story").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_feed_yields_empty_report() {
        let h = Harness::new().await;
        assert_eq!(h.cycle(Vec::new()).await, CycleReport::default());
    }

    /// Repository wrapper whose `create` fails for one article id and whose
    /// anchor writes can be made to fail.
    struct PoisonedStore {
        inner: Repository,
        poisoned: &'static str,
        anchor_fails: bool,
    }

    #[async_trait]
    impl ArticleStore for PoisonedStore {
        async fn get_by_id(&self, article_id: &str) -> Result<Option<ArticleRecord>> {
            self.inner.get_by_id(article_id).await
        }

        async fn create(&self, record: &ArticleRecord) -> Result<()> {
            if record.article_id == self.poisoned {
                return Err(AppError::Store("disk full".into()));
            }
            self.inner.create(record).await
        }

        async fn set_thread_anchor(&self, article_id: &str, anchor: &NotificationId) -> Result<()> {
            if self.anchor_fails {
                return Err(AppError::Store("disk full".into()));
            }
            self.inner.set_thread_anchor(article_id, anchor).await
        }
    }

    #[async_trait]
    impl VersionStore for PoisonedStore {
        async fn append(&self, record: &VersionRecord) -> Result<()> {
            self.inner.append(record).await
        }

        async fn latest(&self, article_id: &str) -> Result<Option<VersionRecord>> {
            self.inner.latest(article_id).await
        }

        async fn count_matching_hash(&self, article_id: &str, content_hash: &str) -> Result<u64> {
            self.inner.count_matching_hash(article_id, content_hash).await
        }
    }

    #[tokio::test]
    async fn store_failure_is_isolated_to_its_entry() {
        let store = PoisonedStore {
            inner: Repository::open_in_memory().await.unwrap(),
            poisoned: "bad",
            anchor_fails: false,
        };
        let notifier = RecordingNotifier::default();
        let renderer = FakeRenderer::default();
        let pipeline = Pipeline::new(&store, &notifier, &renderer, RetryPolicy::no_retry());

        let report = pipeline
            .run_cycle(vec![
                raw("bad", "A", "", Some("X")),
                raw("good", "B", "", Some("Y")),
            ])
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.new, 1);
        assert!(store.inner.latest("bad").await.unwrap().is_none());
        assert!(store.inner.latest("good").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_anchor_write_ends_the_item_without_a_second_root() {
        let store = PoisonedStore {
            inner: Repository::open_in_memory().await.unwrap(),
            poisoned: "",
            anchor_fails: true,
        };
        let notifier = RecordingNotifier::default();
        let renderer = FakeRenderer::default();
        let pipeline = Pipeline::new(&store, &notifier, &renderer, RetryPolicy::no_retry());

        pipeline.run_cycle(vec![raw("s", "A", "<p>One</p>", Some("X"))]).await;

        let mut edited = raw("s", "B", "<p>Two</p>", Some("Y"));
        edited.link = "https://example.com/s-moved".into();
        let report = pipeline.run_cycle(vec![edited]).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.changed, 0);
        assert_eq!(report.notifications_failed, 0);
        assert_eq!(notifier.roots(), 1);
        assert_eq!(notifier.replies().len(), 1);
        assert_eq!(store.inner.history("s").await.unwrap().len(), 2);
    }
}
