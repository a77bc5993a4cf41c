//! SQLite NotificationRepository implementation.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::{DbError, DbResult, NotificationRecord, NotificationRepository};

/// SQLx-backed notification record repository.
pub struct SqliteNotificationRepository {
    pub(crate) pool: SqlitePool,
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> NotificationRecord {
    NotificationRecord {
        id: row.get("id"),
        project_id: row.get("project_id"),
        volunteer_id: row.get("volunteer_id"),
        score: row.get("score"),
        sent_at: row.get("sent_at"),
        batch_id: row.get("batch_id"),
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn insert(&self, record: &NotificationRecord) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO notification_record (id, project_id, volunteer_id, score, sent_at, batch_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.project_id)
        .bind(&record.volunteer_id)
        .bind(record.score)
        .bind(&record.sent_at)
        .bind(&record.batch_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn last_notified_at(
        &self,
        project_id: &str,
        volunteer_id: &str,
    ) -> DbResult<Option<String>> {
        let row = sqlx::query(
            "SELECT MAX(sent_at) AS last_sent FROM notification_record
             WHERE project_id = ? AND volunteer_id = ?",
        )
        .bind(project_id)
        .bind(volunteer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.get("last_sent"))
    }

    async fn list_for_batch(&self, batch_id: &str) -> DbResult<Vec<NotificationRecord>> {
        let rows = sqlx::query(
            "SELECT id, project_id, volunteer_id, score, sent_at, batch_id
             FROM notification_record WHERE batch_id = ?
             ORDER BY project_id, volunteer_id",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_record).collect())
    }
}
