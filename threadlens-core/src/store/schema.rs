/// Current schema version.
pub const SCHEMA_VERSION: &str = "1";

/// Full SQL schema for the Threadlens `SQLite` database.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS threadlens_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- The loaded dataset. Posts are bulk-loaded and never individually mutated.
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT,
    author TEXT,
    platform TEXT NOT NULL,
    source TEXT NOT NULL,
    score INTEGER NOT NULL,
    num_comments INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    url TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_posts_platform ON posts(platform);
CREATE INDEX IF NOT EXISTS idx_posts_source ON posts(source);
CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author);
CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);
CREATE INDEX IF NOT EXISTS idx_posts_score ON posts(score);
CREATE INDEX IF NOT EXISTS idx_posts_num_comments ON posts(num_comments);
";

/// Contentless FTS index over the searchable text columns. Kept in a
/// separate batch so a build without fts5 can fall back to LIKE search.
pub const FTS_SQL: &str = r"
CREATE VIRTUAL TABLE IF NOT EXISTS posts_search USING fts5(
    title,
    content,
    content='posts',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

-- Keep the index in lockstep with the posts table
CREATE TRIGGER IF NOT EXISTS posts_search_ai AFTER INSERT ON posts BEGIN
    INSERT INTO posts_search(rowid, title, content)
    VALUES (new.rowid, new.title, new.content);
END;
CREATE TRIGGER IF NOT EXISTS posts_search_ad AFTER DELETE ON posts BEGIN
    INSERT INTO posts_search(posts_search, rowid, title, content)
    VALUES ('delete', old.rowid, old.title, old.content);
END;
CREATE TRIGGER IF NOT EXISTS posts_search_au AFTER UPDATE ON posts BEGIN
    INSERT INTO posts_search(posts_search, rowid, title, content)
    VALUES ('delete', old.rowid, old.title, old.content);
    INSERT INTO posts_search(rowid, title, content)
    VALUES (new.rowid, new.title, new.content);
END;
";
