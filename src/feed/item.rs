use chrono::{DateTime, Utc};
use html2text::render::TrivialDecorator;

use crate::error::{AppError, Result};
use crate::models::{ArticleFields, ObservedArticle};

/// Wide enough that real abstracts are never wrapped.
const PLAIN_TEXT_WIDTH: usize = 4096;

/// A feed entry before validation and sanitising.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawItem {
    pub id: String,
    pub link: String,
    pub title: String,
    pub summary: String,
    pub author: Option<String>,
}

impl RawItem {
    /// Validate and sanitise the entry into the fields that get tracked.
    ///
    /// Entries without an author are rejected.
    pub fn into_observed(self, observed_at: DateTime<Utc>) -> Result<ObservedArticle> {
        let article_id = self
            .id
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| AppError::MalformedItem("entry has no id".to_string()))?;

        let author = self
            .author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| AppError::MalformedItem(format!("entry {} has no author", article_id)))?;

        Ok(ObservedArticle {
            article_id,
            fields: ArticleFields {
                url: self.link,
                title: self.title,
                abstract_text: strip_html(&self.summary)?,
                author,
            },
            observed_at,
        })
    }
}

/// Convert HTML to plain text with every tag, attribute and style removed.
pub fn strip_html(html: &str) -> Result<String> {
    if html.trim().is_empty() {
        return Ok(String::new());
    }

    let text = html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(html.as_bytes(), PLAIN_TEXT_WIDTH)
        .map_err(|e| AppError::MalformedItem(format!("could not sanitise summary: {}", e)))?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}
