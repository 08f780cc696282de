/// Inline SQL migrations for the vault database schema.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained. Statements are
/// applied in order and tracked by version in `_migrations`.
pub const MIGRATIONS: &[&str] = &[
    // Migration 1: projects table
    r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    sessions TEXT NOT NULL DEFAULT '[]',
    created_at TEXT,
    last_synced TEXT,
    session_count INTEGER NOT NULL DEFAULT 0,
    message_count INTEGER NOT NULL DEFAULT 0,
    last_conversation_date TEXT,
    stats_updated_at TEXT
);
"#,
    // Migration 2: sessions table
    r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    project_path TEXT NOT NULL DEFAULT '',
    first_message TEXT,
    message_timestamp TEXT,
    todo_data TEXT,
    created_at TEXT,
    last_synced TEXT,
    message_count INTEGER NOT NULL DEFAULT 0
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at);"#,
    // Migration 3: messages table, keyed by session id and position
    r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    project_id TEXT NOT NULL DEFAULT '',
    message_index INTEGER NOT NULL,
    type TEXT,
    role TEXT,
    content TEXT,
    timestamp TEXT,
    raw_data TEXT NOT NULL,
    last_synced TEXT
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_messages_project ON messages(project_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_messages_session_timestamp ON messages(session_id, timestamp);"#,
    // Migration 4: full-text index over message content, kept in sync
    // by triggers on the content table.
    r#"
CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    content,
    content='messages',
    content_rowid='rowid'
);
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS messages_fts_insert AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, content) VALUES (new.rowid, new.content);
END;
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS messages_fts_delete AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
END;
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS messages_fts_update AFTER UPDATE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
    INSERT INTO messages_fts(rowid, content) VALUES (new.rowid, new.content);
END;
"#,
];
