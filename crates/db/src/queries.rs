// crates/db/src/queries.rs
//! Read paths over the vault database.

use crate::{Database, DbError, DbResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

/// Aggregate statistics stored on a project row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStats {
    pub id: String,
    pub path: String,
    pub session_count: i64,
    pub message_count: i64,
    pub last_conversation_date: Option<String>,
    pub stats_updated_at: Option<String>,
    pub last_synced: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for ProjectStats {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            path: row.try_get("path")?,
            session_count: row.try_get("session_count")?,
            message_count: row.try_get("message_count")?,
            last_conversation_date: row.try_get("last_conversation_date")?,
            stats_updated_at: row.try_get("stats_updated_at")?,
            last_synced: row.try_get("last_synced")?,
        })
    }
}

/// A session row as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: String,
    pub project_id: String,
    pub project_path: String,
    pub first_message: Option<String>,
    pub message_timestamp: Option<String>,
    pub todo_data: Option<String>,
    pub message_count: i64,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for SessionRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            project_path: row.try_get("project_path")?,
            first_message: row.try_get("first_message")?,
            message_timestamp: row.try_get("message_timestamp")?,
            todo_data: row.try_get("todo_data")?,
            message_count: row.try_get("message_count")?,
        })
    }
}

/// A message row as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub project_id: String,
    pub message_index: i64,
    pub kind: Option<String>,
    pub role: Option<String>,
    pub content: Option<String>,
    pub timestamp: Option<String>,
    pub raw_data: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for MessageRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            project_id: row.try_get("project_id")?,
            message_index: row.try_get("message_index")?,
            kind: row.try_get("type")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            timestamp: row.try_get("timestamp")?,
            raw_data: row.try_get("raw_data")?,
        })
    }
}

/// One full-text search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub message_id: String,
    pub session_id: String,
    pub content: Option<String>,
    pub timestamp: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for SearchHit {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            message_id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            content: row.try_get("content")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

impl Database {
    pub async fn get_project_stats(&self, project_id: &str) -> DbResult<Option<ProjectStats>> {
        let row = sqlx::query_as::<_, ProjectStats>(
            r#"
            SELECT id, path, session_count, message_count,
                   last_conversation_date, stats_updated_at, last_synced
            FROM projects WHERE id = ?
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_session(&self, session_id: &str) -> DbResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, project_id, project_path, first_message, message_timestamp,
                   todo_data, message_count
            FROM sessions WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Messages of a session in transcript order.
    pub async fn messages_for_session(&self, session_id: &str) -> DbResult<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, session_id, project_id, message_index, type, role, content,
                   timestamp, raw_data
            FROM messages WHERE session_id = ? ORDER BY message_index
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full-text search over message content.
    ///
    /// Uses the FTS index when available; if the MATCH query fails
    /// (FTS5 not compiled in, or unbalanced query syntax) the search
    /// degrades to a substring scan instead of erroring out.
    pub async fn search_messages(&self, query: &str, limit: u32) -> DbResult<Vec<SearchHit>> {
        match self.search_messages_fts(query, limit).await {
            Ok(hits) => Ok(hits),
            Err(DbError::Sqlx(e)) => {
                warn!(error = %e, "full-text search unavailable, using substring scan");
                self.search_messages_like(query, limit).await
            }
            Err(e) => Err(e),
        }
    }

    async fn search_messages_fts(&self, query: &str, limit: u32) -> DbResult<Vec<SearchHit>> {
        let rows = sqlx::query_as::<_, SearchHit>(
            r#"
            SELECT m.id, m.session_id, m.content, m.timestamp
            FROM messages_fts f
            JOIN messages m ON m.rowid = f.rowid
            WHERE messages_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn search_messages_like(&self, query: &str, limit: u32) -> DbResult<Vec<SearchHit>> {
        let rows = sqlx::query_as::<_, SearchHit>(
            r#"
            SELECT id, session_id, content, timestamp
            FROM messages
            WHERE content LIKE '%' || ? || '%'
            ORDER BY timestamp
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
