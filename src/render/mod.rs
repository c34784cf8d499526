//! Turning an (old, new) pair of field values into an attachable artifact.

mod html;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

pub use html::HtmlDiffRenderer;

/// A rendered diff on local disk, ready to be attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render the difference between two non-empty strings.
    async fn render(&self, old: &str, new: &str) -> Result<Artifact>;
}
