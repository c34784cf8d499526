use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed item: {0}")]
    MalformedItem(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True when the failure is a dropped connection worth retrying.
    ///
    /// Walks the whole source chain, since reqwest and hyper bury the
    /// underlying `io::Error` a few levels deep.
    pub fn is_transient(&self) -> bool {
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = source {
            if err.downcast_ref::<io::Error>().is_some_and(is_connection_reset) {
                return true;
            }
            source = err.source();
        }
        false
    }

    /// True when the local store failed, as opposed to a collaborator.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Sqlite(_) | AppError::Store(_)
        )
    }
}

fn is_connection_reset(err: &io::Error) -> bool {
    // io::Error::source() skips the wrapped error itself, so look inside by hand
    err.kind() == io::ErrorKind::ConnectionReset
        || err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<io::Error>())
            .is_some_and(is_connection_reset)
}
