use std::time::Duration;

use feed_rs::model::{Entry, Person};
use feed_rs::parser;
use reqwest::Client;

use super::item::RawItem;
use crate::error::{AppError, Result};
use crate::pipeline::RetryPolicy;

/// Items of one fetched feed, in feed order.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub title: Option<String>,
    pub items: Vec<RawItem>,
}

pub struct FeedFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl FeedFetcher {
    pub fn new(retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("rss-diff/1.0")
            .build()?;

        Ok(Self { client, retry })
    }

    pub async fn fetch(&self, url: &str) -> Result<FeedSnapshot> {
        let client = &self.client;
        let bytes = self
            .retry
            .run(url, move || async move {
                let response = client.get(url).send().await?;
                if !response.status().is_success() {
                    return Err(AppError::from(anyhow::anyhow!(
                        "Failed to fetch feed: HTTP {}",
                        response.status()
                    )));
                }
                Ok::<_, AppError>(response.bytes().await?)
            })
            .await?;

        parse_feed(&bytes[..])
    }
}

pub fn parse_feed(bytes: &[u8]) -> Result<FeedSnapshot> {
    let feed = parser::parse(bytes)?;

    Ok(FeedSnapshot {
        title: feed.title.map(|t| t.content),
        items: feed.entries.into_iter().map(raw_item).collect(),
    })
}

fn raw_item(entry: Entry) -> RawItem {
    // Summary first, falling back to full content
    let summary = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();

    RawItem {
        id: entry.id,
        link: entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default(),
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        summary,
        author: entry
            .authors
            .first()
            .map(byline)
            .filter(|name| !name.trim().is_empty()),
    }
}

/// feed-rs names an RSS 2.0 `<author>` person "author" and keeps the element
/// text in `email`. `dc:creator` and Atom authors carry the real name.
fn byline(person: &Person) -> String {
    match &person.email {
        Some(email) if person.name == "author" => email.clone(),
        _ => person.name.clone(),
    }
}
