pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- articles table: one row per article ever seen
CREATE TABLE IF NOT EXISTS articles (
    article_id TEXT PRIMARY KEY NOT NULL,
    add_dt TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'home',
    thread_anchor_id TEXT
);

-- versions table: append-only snapshots of tracked fields
CREATE TABLE IF NOT EXISTS versions (
    article_id TEXT NOT NULL REFERENCES articles(article_id),
    version INTEGER NOT NULL CHECK (version >= 1),
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    abstract TEXT NOT NULL,
    author TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (article_id, version)
);

CREATE INDEX IF NOT EXISTS idx_versions_article_hash ON versions(article_id, content_hash);
"#;
