mod article;
mod fields;
mod version;

pub use article::{ArticleRecord, ArticleStatus, NotificationId, ObservedArticle, DRY_RUN_ID_PREFIX};
pub use fields::{ArticleFields, TrackedField};
pub use version::VersionRecord;
