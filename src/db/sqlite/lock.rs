//! SQLite advisory lock implementation for batch jobs.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::utils::{current_timestamp, minutes_since};
use crate::db::{DbError, DbResult, LockRepository};

/// Row-based advisory locks in the `batch_lock` table.
pub struct SqliteLockRepository {
    pub(crate) pool: SqlitePool,
}

#[async_trait]
impl LockRepository for SqliteLockRepository {
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        stale_after_seconds: i64,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await.map_err(DbError::from_sqlx)?;

        let existing = sqlx::query("SELECT holder, acquired_at FROM batch_lock WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::from_sqlx)?;

        if let Some(row) = existing {
            let acquired_at: String = row.get("acquired_at");
            let stale = minutes_since(&acquired_at)
                .map(|m| m * 60 >= stale_after_seconds)
                .unwrap_or(true);
            if !stale {
                tx.rollback().await.map_err(DbError::from_sqlx)?;
                return Ok(false);
            }
            // Abandoned lock: steal it.
            sqlx::query("DELETE FROM batch_lock WHERE name = ?")
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(DbError::from_sqlx)?;
        }

        sqlx::query("INSERT INTO batch_lock (name, holder, acquired_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(holder)
            .bind(current_timestamp())
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_sqlx)?;
        tx.commit().await.map_err(DbError::from_sqlx)?;
        Ok(true)
    }

    async fn release(&self, name: &str, holder: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM batch_lock WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        Ok(())
    }
}
