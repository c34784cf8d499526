//! Posting change notifications and keeping them threaded per article.

mod dry_run;
mod threader;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::NotificationId;
use crate::render::Artifact;

pub use dry_run::DryRunNotifier;
pub use threader::NotificationThreader;

/// Transport for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dry-run notifiers hand out ids that do not exist on any server.
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Post a plain-text notification that starts a new thread.
    async fn post_root(&self, text: &str) -> Result<NotificationId>;

    /// Post `text` with `artifact` attached as a reply to `in_reply_to`.
    async fn post_reply(
        &self,
        text: &str,
        artifact: &Artifact,
        in_reply_to: &NotificationId,
    ) -> Result<NotificationId>;
}

#[cfg(test)]
pub mod testing {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::Notifier;
    use crate::error::{AppError, Result};
    use crate::models::NotificationId;
    use crate::render::Artifact;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Post {
        Root {
            id: NotificationId,
            text: String,
        },
        Reply {
            id: NotificationId,
            text: String,
            artifact: PathBuf,
            in_reply_to: NotificationId,
        },
    }

    /// Notifier that remembers every post and can be told to fail.
    #[derive(Default)]
    pub struct RecordingNotifier {
        posts: Mutex<Vec<Post>>,
        next_id: AtomicU64,
        pub fail_roots: AtomicBool,
        pub fail_replies: AtomicBool,
    }

    impl RecordingNotifier {
        pub fn posts(&self) -> Vec<Post> {
            self.posts.lock().unwrap().clone()
        }

        pub fn roots(&self) -> usize {
            self.posts()
                .iter()
                .filter(|p| matches!(p, Post::Root { .. }))
                .count()
        }

        pub fn replies(&self) -> Vec<(String, NotificationId)> {
            self.posts()
                .into_iter()
                .filter_map(|p| match p {
                    Post::Reply {
                        text, in_reply_to, ..
                    } => Some((text, in_reply_to)),
                    Post::Root { .. } => None,
                })
                .collect()
        }

        fn next(&self) -> NotificationId {
            NotificationId(format!("n{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn post_root(&self, text: &str) -> Result<NotificationId> {
            if self.fail_roots.load(Ordering::SeqCst) {
                return Err(AppError::Notify("root rejected".into()));
            }
            let id = self.next();
            self.posts.lock().unwrap().push(Post::Root {
                id: id.clone(),
                text: text.to_string(),
            });
            Ok(id)
        }

        async fn post_reply(
            &self,
            text: &str,
            artifact: &Artifact,
            in_reply_to: &NotificationId,
        ) -> Result<NotificationId> {
            if self.fail_replies.load(Ordering::SeqCst) {
                return Err(AppError::Notify("reply rejected".into()));
            }
            let id = self.next();
            self.posts.lock().unwrap().push(Post::Reply {
                id: id.clone(),
                text: text.to_string(),
                artifact: artifact.path.clone(),
                in_reply_to: in_reply_to.clone(),
            });
            Ok(id)
        }
    }
}
