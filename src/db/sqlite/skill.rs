//! SQLite SkillRepository implementation.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{DbError, DbResult, Skill, SkillRepository};

/// SQLx-backed skill repository.
pub struct SqliteSkillRepository {
    pub(crate) pool: SqlitePool,
}

/// Case-fold and collapse whitespace so "Event  Planning" and
/// "event planning" resolve to the same taxonomy row.
pub(crate) fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn row_to_skill(row: &sqlx::sqlite::SqliteRow) -> Skill {
    Skill {
        id: row.get("id"),
        name: row.get("name"),
        category: row.get("category"),
        created_at: row.get("created_at"),
    }
}

const SKILL_COLS: &str = "id, name, category, created_at";

#[async_trait]
impl SkillRepository for SqliteSkillRepository {
    async fn upsert(&self, name: &str, category: Option<&str>) -> DbResult<Skill> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return Err(DbError::Validation {
                message: "Skill name cannot be empty".to_string(),
            });
        }

        // ON CONFLICT DO NOTHING then re-select: parallel inserts of the
        // same normalized name resolve deterministically to a single row.
        sqlx::query(
            "INSERT INTO skill (id, name, normalized_name, category, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(normalized_name) DO NOTHING",
        )
        .bind(generate_entity_id())
        .bind(name.trim())
        .bind(&normalized)
        .bind(category)
        .bind(current_timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM skill WHERE normalized_name = ?",
            SKILL_COLS
        ))
        .bind(&normalized)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row_to_skill(&row))
    }

    async fn get(&self, id: &str) -> DbResult<Skill> {
        let row = sqlx::query(&format!("SELECT {} FROM skill WHERE id = ?", SKILL_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;

        let row = row.ok_or(DbError::NotFound {
            entity_type: "Skill".to_string(),
            id: id.to_string(),
        })?;
        Ok(row_to_skill(&row))
    }

    async fn list(&self) -> DbResult<Vec<Skill>> {
        let rows = sqlx::query(&format!("SELECT {} FROM skill ORDER BY id", SKILL_COLS))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_skill).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_name;

    #[test]
    fn normalization_folds_case_and_whitespace() {
        assert_eq!(normalize_name("Event Planning"), "event planning");
        assert_eq!(normalize_name("  Event   PLANNING  "), "event planning");
        assert_eq!(normalize_name("   "), "");
    }
}
