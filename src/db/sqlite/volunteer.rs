//! SQLite VolunteerRepository implementation: profiles, claims, overrides.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::models::DEFAULT_CLAIM_WEIGHT;
use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{
    ClaimInput, DbError, DbResult, Volunteer, VolunteerClaim, VolunteerRepository, WeightOverride,
};

/// SQLx-backed volunteer repository.
pub struct SqliteVolunteerRepository {
    pub(crate) pool: SqlitePool,
}

pub(crate) fn clamp_weight(weight: f64) -> f64 {
    weight.clamp(0.0, 1.0)
}

pub(crate) fn clamp_proficiency(proficiency: i32) -> i32 {
    proficiency.clamp(1, 5)
}

fn row_to_volunteer(row: &sqlx::sqlite::SqliteRow) -> Volunteer {
    Volunteer {
        id: row.get("id"),
        user_id: row.get("user_id"),
        skills_visible: row.get("skills_visible"),
        location: row.get("location"),
        created_at: row.get("created_at"),
    }
}

fn row_to_claim(row: &sqlx::sqlite::SqliteRow) -> VolunteerClaim {
    VolunteerClaim {
        volunteer_id: row.get("volunteer_id"),
        skill_id: row.get("skill_id"),
        weight: row.get("weight"),
        proficiency: row.get("proficiency"),
        active: row.get("active"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_override(row: &sqlx::sqlite::SqliteRow) -> WeightOverride {
    WeightOverride {
        id: row.get("id"),
        volunteer_id: row.get("volunteer_id"),
        skill_id: row.get("skill_id"),
        adjuster_user_id: row.get("adjuster_user_id"),
        previous_weight: row.get("previous_weight"),
        new_weight: row.get("new_weight"),
        reason: row.get("reason"),
        created_at: row.get("created_at"),
    }
}

const CLAIM_COLS: &str = "volunteer_id, skill_id, weight, proficiency, active, updated_at";

#[async_trait]
impl VolunteerRepository for SqliteVolunteerRepository {
    async fn create(&self, volunteer: &Volunteer) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO volunteer (id, user_id, skills_visible, location, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&volunteer.id)
        .bind(&volunteer.user_id)
        .bind(volunteer.skills_visible)
        .bind(&volunteer.location)
        .bind(&volunteer.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> DbResult<Volunteer> {
        let row = sqlx::query(
            "SELECT id, user_id, skills_visible, location, created_at FROM volunteer WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        let row = row.ok_or(DbError::NotFound {
            entity_type: "Volunteer".to_string(),
            id: id.to_string(),
        })?;
        Ok(row_to_volunteer(&row))
    }

    async fn get_by_user(&self, user_id: &str) -> DbResult<Option<Volunteer>> {
        let row = sqlx::query(
            "SELECT id, user_id, skills_visible, location, created_at
             FROM volunteer WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.as_ref().map(row_to_volunteer))
    }

    async fn set_claims(&self, volunteer_id: &str, claims: &[ClaimInput]) -> DbResult<()> {
        let now = current_timestamp();
        let mut tx = self.pool.begin().await.map_err(DbError::from_sqlx)?;

        // Deactivate everything, then re-activate what the caller kept.
        // Removed skills stay as inactive rows so the audit trail and
        // historical matches keep their referents.
        sqlx::query("UPDATE volunteer_claim SET active = 0, updated_at = ? WHERE volunteer_id = ?")
            .bind(&now)
            .bind(volunteer_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_sqlx)?;

        for claim in claims {
            let weight = clamp_weight(claim.weight.unwrap_or(DEFAULT_CLAIM_WEIGHT));
            let proficiency = clamp_proficiency(claim.proficiency.unwrap_or(3));
            sqlx::query(
                "INSERT INTO volunteer_claim (volunteer_id, skill_id, weight, proficiency, active, updated_at)
                 VALUES (?, ?, ?, ?, 1, ?)
                 ON CONFLICT(volunteer_id, skill_id) DO UPDATE SET
                     weight = excluded.weight,
                     proficiency = excluded.proficiency,
                     active = 1,
                     updated_at = excluded.updated_at",
            )
            .bind(volunteer_id)
            .bind(&claim.skill_id)
            .bind(weight)
            .bind(proficiency)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_sqlx)?;
        }

        tx.commit().await.map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn get_active_claims(&self, volunteer_id: &str) -> DbResult<Vec<VolunteerClaim>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM volunteer_claim WHERE volunteer_id = ? AND active = 1 ORDER BY skill_id",
            CLAIM_COLS
        ))
        .bind(volunteer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_claim).collect())
    }

    async fn get_claim(
        &self,
        volunteer_id: &str,
        skill_id: &str,
    ) -> DbResult<Option<VolunteerClaim>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM volunteer_claim WHERE volunteer_id = ? AND skill_id = ?",
            CLAIM_COLS
        ))
        .bind(volunteer_id)
        .bind(skill_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.as_ref().map(row_to_claim))
    }

    async fn adjust_weight(
        &self,
        volunteer_id: &str,
        skill_id: &str,
        new_weight: f64,
        adjuster_user_id: &str,
        reason: Option<&str>,
    ) -> DbResult<WeightOverride> {
        let new_weight = clamp_weight(new_weight);
        let now = current_timestamp();
        let mut tx = self.pool.begin().await.map_err(DbError::from_sqlx)?;

        let row = sqlx::query(
            "SELECT weight FROM volunteer_claim WHERE volunteer_id = ? AND skill_id = ?",
        )
        .bind(volunteer_id)
        .bind(skill_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::from_sqlx)?;
        let previous_weight: f64 = row
            .map(|r| r.get("weight"))
            .ok_or_else(|| DbError::NotFound {
                entity_type: "VolunteerClaim".to_string(),
                id: format!("{}/{}", volunteer_id, skill_id),
            })?;

        sqlx::query(
            "UPDATE volunteer_claim SET weight = ?, updated_at = ?
             WHERE volunteer_id = ? AND skill_id = ?",
        )
        .bind(new_weight)
        .bind(&now)
        .bind(volunteer_id)
        .bind(skill_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from_sqlx)?;

        let record = WeightOverride {
            id: generate_entity_id(),
            volunteer_id: volunteer_id.to_string(),
            skill_id: skill_id.to_string(),
            adjuster_user_id: adjuster_user_id.to_string(),
            previous_weight,
            new_weight,
            reason: reason.map(str::to_string),
            created_at: now,
        };
        sqlx::query(
            "INSERT INTO weight_override
                 (id, volunteer_id, skill_id, adjuster_user_id, previous_weight, new_weight, reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.volunteer_id)
        .bind(&record.skill_id)
        .bind(&record.adjuster_user_id)
        .bind(record.previous_weight)
        .bind(record.new_weight)
        .bind(&record.reason)
        .bind(&record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from_sqlx)?;

        tx.commit().await.map_err(DbError::from_sqlx)?;
        Ok(record)
    }

    async fn list_overrides(
        &self,
        volunteer_id: &str,
        skill_id: &str,
    ) -> DbResult<Vec<WeightOverride>> {
        let rows = sqlx::query(
            "SELECT id, volunteer_id, skill_id, adjuster_user_id, previous_weight, new_weight, reason, created_at
             FROM weight_override
             WHERE volunteer_id = ? AND skill_id = ?
             ORDER BY created_at, id",
        )
        .bind(volunteer_id)
        .bind(skill_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_override).collect())
    }

    async fn list_active_volunteer_ids(&self) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT volunteer_id FROM volunteer_claim WHERE active = 1 ORDER BY volunteer_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(|r| r.get("volunteer_id")).collect())
    }
}
