//! SQLite MessageRepository implementation: message log and read receipts.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::{DbError, DbResult, Message, MessageCursor, MessageRepository, MessageType};

/// SQLx-backed message repository.
pub struct SqliteMessageRepository {
    pub(crate) pool: SqlitePool,
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    let message_type: String = row.get("message_type");
    Message {
        id: row.get("id"),
        project_id: row.get("project_id"),
        sender_user_id: row.get("sender_user_id"),
        recipient_user_id: row.get("recipient_user_id"),
        task_id: row.get("task_id"),
        message_type: message_type.parse().unwrap_or(MessageType::General),
        body: row.get("body"),
        created_at: row.get("created_at"),
        edited_at: row.get("edited_at"),
        deleted_at: row.get("deleted_at"),
    }
}

const MESSAGE_COLS: &str = "id, project_id, sender_user_id, recipient_user_id, task_id, \
     message_type, body, created_at, edited_at, deleted_at";

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn insert(&self, message: &Message) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO message
                 (id, project_id, sender_user_id, recipient_user_id, task_id, message_type,
                  body, created_at, edited_at, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.project_id)
        .bind(&message.sender_user_id)
        .bind(&message.recipient_user_id)
        .bind(&message.task_id)
        .bind(message.message_type.to_string())
        .bind(&message.body)
        .bind(&message.created_at)
        .bind(&message.edited_at)
        .bind(&message.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> DbResult<Message> {
        let row = sqlx::query(&format!("SELECT {} FROM message WHERE id = ?", MESSAGE_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        let row = row.ok_or(DbError::NotFound {
            entity_type: "Message".to_string(),
            id: id.to_string(),
        })?;
        Ok(row_to_message(&row))
    }

    async fn list_page(
        &self,
        project_id: &str,
        cursor: Option<&MessageCursor>,
        limit: usize,
        include_deleted: bool,
    ) -> DbResult<Vec<Message>> {
        let deleted_clause = if include_deleted {
            ""
        } else {
            "AND deleted_at IS NULL"
        };

        let rows = match cursor {
            Some(cursor) => {
                sqlx::query(&format!(
                    "SELECT {} FROM message
                     WHERE project_id = ? {}
                       AND (created_at < ? OR (created_at = ? AND id < ?))
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?",
                    MESSAGE_COLS, deleted_clause
                ))
                .bind(project_id)
                .bind(&cursor.created_at)
                .bind(&cursor.created_at)
                .bind(&cursor.id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM message
                     WHERE project_id = ? {}
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?",
                    MESSAGE_COLS, deleted_clause
                ))
                .bind(project_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn list_since(&self, project_id: &str, since: &str) -> DbResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM message
             WHERE project_id = ? AND deleted_at IS NULL AND created_at > ?
             ORDER BY created_at ASC, id ASC",
            MESSAGE_COLS
        ))
        .bind(project_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn set_body(&self, id: &str, body: &str, edited_at: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE message SET body = ?, edited_at = ? WHERE id = ?")
            .bind(body)
            .bind(edited_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity_type: "Message".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_deleted(&self, id: &str, deleted_at: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE message SET deleted_at = ? WHERE id = ?")
            .bind(deleted_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity_type: "Message".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_read(&self, user_id: &str, message_id: &str, read_at: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO message_read (user_id, message_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(message_id)
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: &str, project_id: &str, read_at: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO message_read (user_id, message_id, read_at)
             SELECT ?, m.id, ? FROM message m
             WHERE m.project_id = ? AND m.deleted_at IS NULL AND m.sender_user_id != ?",
        )
        .bind(user_id)
        .bind(read_at)
        .bind(project_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn is_read(&self, user_id: &str, message_id: &str) -> DbResult<bool> {
        let row = sqlx::query("SELECT 1 FROM message_read WHERE user_id = ? AND message_id = ?")
            .bind(user_id)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        Ok(row.is_some())
    }

    async fn unread_counts(&self, user_id: &str) -> DbResult<Vec<(String, i64)>> {
        // Membership through the user's volunteer profile, or lead
        // status on the project itself. Own and soft-deleted messages
        // never count.
        let rows = sqlx::query(
            "SELECT m.project_id AS project_id, COUNT(*) AS unread
             FROM message m
             JOIN project p ON p.id = m.project_id
             WHERE m.deleted_at IS NULL
               AND m.sender_user_id != ?
               AND (
                   p.lead_user_id = ?
                   OR EXISTS (
                       SELECT 1 FROM team_member tm
                       JOIN volunteer v ON v.id = tm.volunteer_id
                       WHERE tm.project_id = m.project_id
                         AND tm.status = 'active'
                         AND v.user_id = ?
                   )
               )
               AND NOT EXISTS (
                   SELECT 1 FROM message_read r
                   WHERE r.message_id = m.id AND r.user_id = ?
               )
             GROUP BY m.project_id
             ORDER BY m.project_id",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows
            .iter()
            .map(|r| (r.get("project_id"), r.get("unread")))
            .collect())
    }
}
