use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field whose edits are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedField {
    Url,
    Title,
    Abstract,
    Author,
}

/// Every tracked field, in the order change notifications are posted.
pub const TRACKED_FIELDS: [TrackedField; 4] = [
    TrackedField::Url,
    TrackedField::Title,
    TrackedField::Abstract,
    TrackedField::Author,
];

impl TrackedField {
    /// Key used in the canonical form and the database.
    pub fn key(self) -> &'static str {
        match self {
            TrackedField::Url => "url",
            TrackedField::Title => "title",
            TrackedField::Abstract => "abstract",
            TrackedField::Author => "author",
        }
    }

    /// Text of the notification posted when this field changes.
    pub fn change_message(self) -> &'static str {
        match self {
            TrackedField::Url => "Change in URL",
            TrackedField::Title => "Change in Headline",
            TrackedField::Abstract => "Change in Abstract",
            TrackedField::Author => "Change in Author",
        }
    }
}

/// Snapshot of the tracked fields of one article.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleFields {
    pub url: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub author: String,
}

impl ArticleFields {
    pub fn get(&self, field: TrackedField) -> &str {
        match field {
            TrackedField::Url => &self.url,
            TrackedField::Title => &self.title,
            TrackedField::Abstract => &self.abstract_text,
            TrackedField::Author => &self.author,
        }
    }

    pub fn to_map(&self) -> BTreeMap<&'static str, &str> {
        TRACKED_FIELDS
            .iter()
            .map(|&field| (field.key(), self.get(field)))
            .collect()
    }

    /// Fields whose values differ from `other`, in notification order.
    pub fn changed_fields(&self, other: &ArticleFields) -> Vec<TrackedField> {
        TRACKED_FIELDS
            .into_iter()
            .filter(|&field| self.get(field) != other.get(field))
            .collect()
    }
}
