// crates/db/src/writes.rs
//! Idempotent write paths. Every statement is an upsert keyed by the
//! entity's stable id; `last_synced` is stamped on every write while
//! `created_at` keeps its first-insert value.

use crate::{Database, DbResult};
use chrono::Utc;
use prompt_vault_core::{MessageRecord, Project, SessionRecord};
use tracing::debug;

impl Database {
    /// Insert or update a project row. The session-id list is stored as
    /// a JSON array; statistics columns are left for
    /// [`Database::update_project_statistics`].
    pub async fn upsert_project(&self, project: &Project) -> DbResult<()> {
        let sessions_json = serde_json::to_string(&project.session_ids)?;
        sqlx::query(
            r#"
            INSERT INTO projects (id, path, sessions, created_at, last_synced)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                sessions = excluded.sessions,
                last_synced = excluded.last_synced
            "#,
        )
        .bind(&project.id)
        .bind(&project.path)
        .bind(sessions_json)
        .bind(project.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or update a session row.
    pub async fn upsert_session(&self, session: &SessionRecord) -> DbResult<()> {
        let todo_json = session
            .todo_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, project_id, project_path, first_message, message_timestamp,
                 todo_data, created_at, last_synced, message_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                project_path = excluded.project_path,
                first_message = excluded.first_message,
                message_timestamp = excluded.message_timestamp,
                todo_data = excluded.todo_data,
                last_synced = excluded.last_synced,
                message_count = excluded.message_count
            "#,
        )
        .bind(&session.id)
        .bind(&session.project_id)
        .bind(&session.project_path)
        .bind(&session.first_message)
        .bind(&session.message_timestamp)
        .bind(todo_json)
        .bind(session.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(session.message_count as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a session's messages in one transaction.
    ///
    /// Message ids are `{session_id}_{index}` with the zero-based
    /// position in the parsed record list, so re-syncing an unchanged
    /// transcript rewrites the same rows. Returns the number of
    /// messages written.
    pub async fn bulk_upsert_messages(
        &self,
        session_id: &str,
        project_id: &str,
        messages: &[MessageRecord],
    ) -> DbResult<usize> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (index, message) in messages.iter().enumerate() {
            let id = format!("{session_id}_{index}");
            let raw_json = serde_json::to_string(&message.raw_data)?;
            sqlx::query(
                r#"
                INSERT INTO messages
                    (id, session_id, project_id, message_index, type, role, content,
                     timestamp, raw_data, last_synced)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    project_id = excluded.project_id,
                    type = excluded.type,
                    role = excluded.role,
                    content = excluded.content,
                    timestamp = excluded.timestamp,
                    raw_data = excluded.raw_data,
                    last_synced = excluded.last_synced
                "#,
            )
            .bind(&id)
            .bind(session_id)
            .bind(project_id)
            .bind(index as i64)
            .bind(&message.kind)
            .bind(&message.role)
            .bind(&message.content)
            .bind(&message.timestamp)
            .bind(raw_json)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(session_id, count = messages.len(), "messages upserted");
        Ok(messages.len())
    }

    /// Recompute a project's aggregate statistics from its persisted
    /// sessions and messages.
    ///
    /// The last conversation date is the most recent message timestamp
    /// across the project; when no message carries one, it falls back
    /// to the most recent session-level first-message timestamp. RFC
    /// 3339 text ordering matches time ordering.
    pub async fn update_project_statistics(&self, project_id: &str) -> DbResult<()> {
        let (session_count, message_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(message_count), 0)
            FROM sessions WHERE project_id = ?
            "#,
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let (mut last_conversation,): (Option<String>,) = sqlx::query_as(
            r#"
            SELECT MAX(timestamp)
            FROM messages
            WHERE project_id = ? AND timestamp IS NOT NULL AND timestamp != ''
            "#,
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        if last_conversation.is_none() {
            let fallback: (Option<String>,) = sqlx::query_as(
                r#"
                SELECT MAX(message_timestamp)
                FROM sessions
                WHERE project_id = ? AND message_timestamp IS NOT NULL
                "#,
            )
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?;
            last_conversation = fallback.0;
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE projects SET
                session_count = ?,
                message_count = ?,
                last_conversation_date = ?,
                stats_updated_at = ?,
                last_synced = ?
            WHERE id = ?
            "#,
        )
        .bind(session_count)
        .bind(message_count)
        .bind(last_conversation)
        .bind(&now)
        .bind(&now)
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn project(id: &str) -> Project {
        Project {
            id: id.to_string(),
            path: "/workspace/widgets".to_string(),
            session_ids: vec!["s1".to_string()],
            created_at: Utc::now(),
        }
    }

    fn session(id: &str, project_id: &str, message_count: usize) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            project_id: project_id.to_string(),
            project_path: "/workspace/widgets".to_string(),
            first_message: Some("hello".to_string()),
            message_timestamp: Some("2026-01-01T00:00:00Z".to_string()),
            todo_data: None,
            created_at: Utc::now(),
            message_count,
        }
    }

    fn message(content: &str, timestamp: Option<&str>) -> MessageRecord {
        MessageRecord {
            kind: Some("user".to_string()),
            role: Some("user".to_string()),
            content: Some(content.to_string()),
            timestamp: timestamp.map(String::from),
            raw_data: json!({"type": "user", "message": {"role": "user", "content": content}}),
        }
    }

    #[tokio::test]
    async fn test_upsert_project_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        let p = project("proj-a");

        db.upsert_project(&p).await.unwrap();
        db.upsert_project(&p).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_upsert_session_updates_fields() {
        let db = Database::new_in_memory().await.unwrap();
        let mut s = session("s1", "proj-a", 2);
        db.upsert_session(&s).await.unwrap();

        s.first_message = Some("updated".to_string());
        s.message_count = 5;
        db.upsert_session(&s).await.unwrap();

        let row: (String, i64) =
            sqlx::query_as("SELECT first_message, message_count FROM sessions WHERE id = 's1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(row.0, "updated");
        assert_eq!(row.1, 5);
    }

    #[tokio::test]
    async fn test_bulk_upsert_messages_stable_ids() {
        let db = Database::new_in_memory().await.unwrap();
        let messages = vec![
            message("first", Some("2026-01-01T00:00:00Z")),
            message("second", Some("2026-01-01T00:01:00Z")),
        ];

        assert_eq!(
            db.bulk_upsert_messages("s1", "proj-a", &messages).await.unwrap(),
            2
        );
        assert_eq!(
            db.bulk_upsert_messages("s1", "proj-a", &messages).await.unwrap(),
            2
        );

        let ids: Vec<(String, String)> =
            sqlx::query_as("SELECT id, project_id FROM messages ORDER BY message_index")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(
            ids,
            vec![
                ("s1_0".to_string(), "proj-a".to_string()),
                ("s1_1".to_string(), "proj-a".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_project_statistics_from_messages() {
        let db = Database::new_in_memory().await.unwrap();
        db.upsert_project(&project("proj-a")).await.unwrap();
        db.upsert_session(&session("s1", "proj-a", 2)).await.unwrap();
        db.bulk_upsert_messages(
            "s1",
            "proj-a",
            &[
                message("a", Some("2026-01-01T00:00:00Z")),
                message("b", Some("2026-01-02T00:00:00Z")),
            ],
        )
        .await
        .unwrap();

        db.update_project_statistics("proj-a").await.unwrap();

        let row: (i64, i64, String, Option<String>) = sqlx::query_as(
            "SELECT session_count, message_count, last_conversation_date, stats_updated_at FROM projects WHERE id = 'proj-a'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(row.0, 1);
        assert_eq!(row.1, 2);
        assert_eq!(row.2, "2026-01-02T00:00:00Z");
        assert!(row.3.is_some());
    }

    #[tokio::test]
    async fn test_update_project_statistics_falls_back_to_first_message_time() {
        let db = Database::new_in_memory().await.unwrap();
        db.upsert_project(&project("proj-a")).await.unwrap();
        // The session carries a first-message timestamp; the session file
        // itself was created much earlier. Only the former may surface.
        let mut s = session("s1", "proj-a", 1);
        s.message_timestamp = Some("2026-01-01T00:00:00Z".to_string());
        s.created_at = "2020-05-05T00:00:00Z".parse().unwrap();
        db.upsert_session(&s).await.unwrap();
        // One message, without a timestamp.
        db.bulk_upsert_messages("s1", "proj-a", &[message("a", None)])
            .await
            .unwrap();

        db.update_project_statistics("proj-a").await.unwrap();

        let row: (Option<String>,) = sqlx::query_as(
            "SELECT last_conversation_date FROM projects WHERE id = 'proj-a'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(row.0.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_update_project_statistics_without_any_timestamps() {
        let db = Database::new_in_memory().await.unwrap();
        db.upsert_project(&project("proj-a")).await.unwrap();
        let mut s = session("s1", "proj-a", 1);
        s.message_timestamp = None;
        db.upsert_session(&s).await.unwrap();
        db.bulk_upsert_messages("s1", "proj-a", &[message("a", None)])
            .await
            .unwrap();

        db.update_project_statistics("proj-a").await.unwrap();

        let row: (Option<String>,) = sqlx::query_as(
            "SELECT last_conversation_date FROM projects WHERE id = 'proj-a'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(row.0, None);
    }
}
