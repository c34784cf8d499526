use super::Notifier;
use crate::db::ArticleStore;
use crate::error::Result;
use crate::models::NotificationId;
use crate::pipeline::RetryPolicy;
use crate::render::Artifact;

/// Where an article's notification thread stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadState {
    NoAnchorYet,
    AnchorEstablished(NotificationId),
}

/// Posts change notifications so that everything about one article ends
/// up in a single thread.
///
/// The first notification for an article opens the thread with a root
/// post carrying the article URL, replies to it, and stores the reply's id
/// as the anchor. Every later notification replies to that anchor, which
/// is never replaced.
pub struct NotificationThreader<'a, S: ?Sized, N: ?Sized> {
    store: &'a S,
    notifier: &'a N,
    retry: &'a RetryPolicy,
}

impl<'a, S, N> NotificationThreader<'a, S, N>
where
    S: ArticleStore + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(store: &'a S, notifier: &'a N, retry: &'a RetryPolicy) -> Self {
        Self {
            store,
            notifier,
            retry,
        }
    }

    pub async fn thread_state(&self, article_id: &str) -> Result<ThreadState> {
        let anchor = self
            .store
            .get_by_id(article_id)
            .await?
            .and_then(|article| article.thread_anchor_id);

        Ok(match anchor {
            Some(anchor) => ThreadState::AnchorEstablished(anchor),
            None => ThreadState::NoAnchorYet,
        })
    }

    pub async fn notify(
        &self,
        article_id: &str,
        url: &str,
        message: &str,
        artifact: &Artifact,
    ) -> Result<NotificationId> {
        let notifier = self.notifier;

        let state = match self.thread_state(article_id).await? {
            ThreadState::AnchorEstablished(anchor)
                if anchor.is_dry_run() && !notifier.is_dry_run() =>
            {
                tracing::info!("Anchor {} for {} came from a dry run, starting a real thread", anchor, article_id);
                ThreadState::NoAnchorYet
            }
            state => state,
        };

        let (reply_to, opened_thread) = match state {
            ThreadState::AnchorEstablished(anchor) => (anchor, false),
            ThreadState::NoAnchorYet => {
                tracing::info!("Opening thread for {} with {}", article_id, url);
                let root = self
                    .retry
                    .run("post root notification", move || notifier.post_root(url))
                    .await?;
                (root, true)
            }
        };

        tracing::info!("Replying to {} with '{}'", reply_to, message);
        let in_reply_to = &reply_to;
        let posted = self
            .retry
            .run("post reply notification", move || {
                notifier.post_reply(message, artifact, in_reply_to)
            })
            .await;

        let reply = match posted {
            Ok(reply) => reply,
            Err(e) => {
                if opened_thread {
                    // Keep the root so the next change does not open a second thread
                    self.store.set_thread_anchor(article_id, &reply_to).await?;
                }
                return Err(e);
            }
        };

        if opened_thread {
            if let Err(e) = self.store.set_thread_anchor(article_id, &reply).await {
                tracing::error!(
                    "Posted {} for {} but could not store it as the thread anchor",
                    reply,
                    article_id
                );
                return Err(e);
            }
            tracing::debug!("Thread anchor for {} set to {}", article_id, reply);
        }

        Ok(reply)
    }
}
