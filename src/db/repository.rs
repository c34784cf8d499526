use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{ArticleFields, ArticleRecord, ArticleStatus, NotificationId, VersionRecord};

use super::schema::SCHEMA;
use super::store::{ArticleStore, VersionStore};

const VERSION_COLUMNS: &str =
    "article_id, version, url, title, abstract, author, content_hash, recorded_at";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[allow(dead_code)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Every stored version of an article, oldest first.
    pub async fn history(&self, article_id: &str) -> Result<Vec<VersionRecord>> {
        let article_id = article_id.to_string();
        let versions = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM versions WHERE article_id = ?1 ORDER BY version ASC",
                    VERSION_COLUMNS
                ))?;
                let versions = stmt
                    .query_map(params![article_id], version_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(versions)
            })
            .await?;
        Ok(versions)
    }
}

#[async_trait]
impl ArticleStore for Repository {
    async fn get_by_id(&self, article_id: &str) -> Result<Option<ArticleRecord>> {
        let article_id = article_id.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT article_id, add_dt, status, thread_anchor_id FROM articles WHERE article_id = ?1",
                )?;
                let article = stmt
                    .query_row(params![article_id], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    async fn create(&self, record: &ArticleRecord) -> Result<()> {
        let article_id = record.article_id.clone();
        let add_dt = record.first_seen_at.to_rfc3339();
        let status = record.status.as_str();
        let anchor = record.thread_anchor_id.as_ref().map(|id| id.0.clone());

        let inserted = self
            .conn
            .call({
                let article_id = article_id.clone();
                move |conn| {
                    let rows = conn.execute(
                        "INSERT OR IGNORE INTO articles (article_id, add_dt, status, thread_anchor_id) VALUES (?1, ?2, ?3, ?4)",
                        params![article_id, add_dt, status, anchor],
                    )?;
                    Ok(rows)
                }
            })
            .await?;

        if inserted == 0 {
            return Err(AppError::Store(format!("article {} already exists", article_id)));
        }
        Ok(())
    }

    async fn set_thread_anchor(&self, article_id: &str, anchor: &NotificationId) -> Result<()> {
        let article_id = article_id.to_string();
        let anchor = anchor.0.clone();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO articles (article_id, add_dt, status, thread_anchor_id)
                       VALUES (?1, ?2, 'home', ?3)
                       ON CONFLICT(article_id) DO UPDATE SET
                           thread_anchor_id = excluded.thread_anchor_id"#,
                    params![article_id, now, anchor],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VersionStore for Repository {
    async fn append(&self, record: &VersionRecord) -> Result<()> {
        let record = record.clone();
        let article_id = record.article_id.clone();
        let version = record.version;

        // The insert only lands if it extends the sequence by exactly one
        let inserted = self
            .conn
            .call(move |conn| {
                let rows = conn.execute(
                    r#"INSERT INTO versions (article_id, version, url, title, abstract, author, content_hash, recorded_at)
                       SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
                       WHERE ?2 = (SELECT COALESCE(MAX(version), 0) + 1 FROM versions WHERE article_id = ?1)"#,
                    params![
                        record.article_id,
                        record.version,
                        record.fields.url,
                        record.fields.title,
                        record.fields.abstract_text,
                        record.fields.author,
                        record.content_hash,
                        record.recorded_at.to_rfc3339(),
                    ],
                )?;
                Ok(rows)
            })
            .await?;

        if inserted == 0 {
            return Err(AppError::Store(format!(
                "version {} of article {} is out of sequence",
                version, article_id
            )));
        }
        Ok(())
    }

    async fn latest(&self, article_id: &str) -> Result<Option<VersionRecord>> {
        let article_id = article_id.to_string();
        let version = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM versions WHERE article_id = ?1 ORDER BY version DESC LIMIT 1",
                    VERSION_COLUMNS
                ))?;
                let version = stmt
                    .query_row(params![article_id], version_from_row)
                    .optional()?;
                Ok(version)
            })
            .await?;
        Ok(version)
    }

    async fn count_matching_hash(&self, article_id: &str, content_hash: &str) -> Result<u64> {
        let article_id = article_id.to_string();
        let content_hash = content_hash.to_string();
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM versions WHERE article_id = ?1 AND content_hash = ?2",
                    params![article_id, content_hash],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count.max(0) as u64)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> rusqlite::Result<ArticleRecord> {
    let status: String = row.get(2)?;
    let status = status
        .parse::<ArticleStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(ArticleRecord {
        article_id: row.get(0)?,
        first_seen_at: row
            .get::<_, String>(1)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        status,
        thread_anchor_id: row.get::<_, Option<String>>(3)?.map(NotificationId),
    })
}

fn version_from_row(row: &Row) -> rusqlite::Result<VersionRecord> {
    Ok(VersionRecord {
        article_id: row.get(0)?,
        version: row.get(1)?,
        fields: ArticleFields {
            url: row.get(2)?,
            title: row.get(3)?,
            abstract_text: row.get(4)?,
            author: row.get(5)?,
        },
        content_hash: row.get(6)?,
        recorded_at: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
