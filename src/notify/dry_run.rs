use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::Notifier;
use crate::error::Result;
use crate::models::{NotificationId, DRY_RUN_ID_PREFIX};
use crate::render::Artifact;

/// Logs notifications instead of sending them. Ids are unique within a run
/// and start from the current time so they do not collide across runs.
pub struct DryRunNotifier {
    next_id: AtomicU64,
}

impl DryRunNotifier {
    pub fn new() -> Self {
        let seed = Utc::now().timestamp_millis().max(0) as u64;
        Self {
            next_id: AtomicU64::new(seed),
        }
    }

    fn next(&self) -> NotificationId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        NotificationId::new(format!("{}{}", DRY_RUN_ID_PREFIX, id))
    }
}

impl Default for DryRunNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for DryRunNotifier {
    fn is_dry_run(&self) -> bool {
        true
    }

    async fn post_root(&self, text: &str) -> Result<NotificationId> {
        let id = self.next();
        tracing::info!("[dry-run] root {}: {}", id, text);
        Ok(id)
    }

    async fn post_reply(
        &self,
        text: &str,
        artifact: &Artifact,
        in_reply_to: &NotificationId,
    ) -> Result<NotificationId> {
        let id = self.next();
        tracing::info!(
            "[dry-run] reply {} to {}: {} ({})",
            id,
            in_reply_to,
            text,
            artifact.path.display()
        );
        Ok(id)
    }
}
