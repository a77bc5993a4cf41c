//! SQLite MatchRepository implementation.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::{DbError, DbResult, MatchRecord, MatchRepository};

/// SQLx-backed match index repository.
pub struct SqliteMatchRepository {
    pub(crate) pool: SqlitePool,
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> MatchRecord {
    let matched_json: String = row.get("matched_skill_ids");
    MatchRecord {
        volunteer_id: row.get("volunteer_id"),
        project_id: row.get("project_id"),
        score: row.get("score"),
        jaccard: row.get("jaccard"),
        matched_skill_ids: serde_json::from_str(&matched_json).unwrap_or_default(),
        matched_skill_count: row.get("matched_skill_count"),
        computed_at: row.get("computed_at"),
    }
}

const MATCH_COLS: &str = "volunteer_id, project_id, score, jaccard, matched_skill_ids, \
     matched_skill_count, computed_at";

#[async_trait]
impl MatchRepository for SqliteMatchRepository {
    async fn upsert(&self, record: &MatchRecord) -> DbResult<()> {
        let matched_json =
            serde_json::to_string(&record.matched_skill_ids).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "INSERT INTO match_record
                 (volunteer_id, project_id, score, jaccard, matched_skill_ids, matched_skill_count, computed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(volunteer_id, project_id) DO UPDATE SET
                 score = excluded.score,
                 jaccard = excluded.jaccard,
                 matched_skill_ids = excluded.matched_skill_ids,
                 matched_skill_count = excluded.matched_skill_count,
                 computed_at = excluded.computed_at",
        )
        .bind(&record.volunteer_id)
        .bind(&record.project_id)
        .bind(record.score)
        .bind(record.jaccard)
        .bind(matched_json)
        .bind(record.matched_skill_count)
        .bind(&record.computed_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn delete_pair(&self, volunteer_id: &str, project_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM match_record WHERE volunteer_id = ? AND project_id = ?")
            .bind(volunteer_id)
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn get(&self, volunteer_id: &str, project_id: &str) -> DbResult<Option<MatchRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM match_record WHERE volunteer_id = ? AND project_id = ?",
            MATCH_COLS
        ))
        .bind(volunteer_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn for_project(
        &self,
        project_id: &str,
        min_score: f64,
        limit: usize,
    ) -> DbResult<Vec<MatchRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM match_record
             WHERE project_id = ? AND score >= ?
             ORDER BY score DESC, volunteer_id ASC
             LIMIT ?",
            MATCH_COLS
        ))
        .bind(project_id)
        .bind(min_score)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn for_volunteer(
        &self,
        volunteer_id: &str,
        min_score: f64,
        limit: usize,
    ) -> DbResult<Vec<MatchRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM match_record
             WHERE volunteer_id = ? AND score >= ?
             ORDER BY score DESC, project_id ASC
             LIMIT ?",
            MATCH_COLS
        ))
        .bind(volunteer_id)
        .bind(min_score)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn top_visible_candidates(
        &self,
        project_id: &str,
        min_score: f64,
        limit: usize,
    ) -> DbResult<Vec<MatchRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM match_record m
             JOIN volunteer v ON v.id = m.volunteer_id
             WHERE m.project_id = ? AND m.score >= ? AND v.skills_visible = 1
             ORDER BY m.score DESC, m.volunteer_id ASC
             LIMIT ?",
            "m.volunteer_id, m.project_id, m.score, m.jaccard, m.matched_skill_ids, \
             m.matched_skill_count, m.computed_at"
        ))
        .bind(project_id)
        .bind(min_score)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_record).collect())
    }
}
