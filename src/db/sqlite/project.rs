//! SQLite ProjectRepository implementation: projects, requirements,
//! applications, team membership.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::utils::current_timestamp;
use crate::db::{
    Application, ApplicationStatus, DbError, DbResult, MemberStatus, Project, ProjectRepository,
    ProjectStatus, TeamMember,
};

/// SQLx-backed project repository.
pub struct SqliteProjectRepository {
    pub(crate) pool: SqlitePool,
}

fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Project {
    let status: String = row.get("status");
    Project {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: status.parse().unwrap_or(ProjectStatus::Draft),
        lead_user_id: row.get("lead_user_id"),
        creator_user_id: row.get("creator_user_id"),
        location: row.get("location"),
        starts_on: row.get("starts_on"),
        ends_on: row.get("ends_on"),
        budget_total: row.get("budget_total"),
        budget_spent: row.get("budget_spent"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_application(row: &sqlx::sqlite::SqliteRow) -> Application {
    let status: String = row.get("status");
    Application {
        id: row.get("id"),
        project_id: row.get("project_id"),
        volunteer_id: row.get("volunteer_id"),
        status: status.parse().unwrap_or(ApplicationStatus::Pending),
        message: row.get("message"),
        created_at: row.get("created_at"),
        decided_at: row.get("decided_at"),
    }
}

fn row_to_member(row: &sqlx::sqlite::SqliteRow) -> TeamMember {
    let status: String = row.get("status");
    TeamMember {
        project_id: row.get("project_id"),
        volunteer_id: row.get("volunteer_id"),
        status: status.parse().unwrap_or(MemberStatus::Active),
        joined_at: row.get("joined_at"),
        left_at: row.get("left_at"),
    }
}

const PROJECT_COLS: &str = "id, title, description, status, lead_user_id, creator_user_id, \
     location, starts_on, ends_on, budget_total, budget_spent, created_at, updated_at";

const APPLICATION_COLS: &str =
    "id, project_id, volunteer_id, status, message, created_at, decided_at";

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, project: &Project) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO project
                 (id, title, description, status, lead_user_id, creator_user_id, location,
                  starts_on, ends_on, budget_total, budget_spent, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.title)
        .bind(&project.description)
        .bind(project.status.to_string())
        .bind(&project.lead_user_id)
        .bind(&project.creator_user_id)
        .bind(&project.location)
        .bind(&project.starts_on)
        .bind(&project.ends_on)
        .bind(project.budget_total)
        .bind(project.budget_spent)
        .bind(&project.created_at)
        .bind(&project.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> DbResult<Project> {
        let row = sqlx::query(&format!("SELECT {} FROM project WHERE id = ?", PROJECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        let row = row.ok_or(DbError::NotFound {
            entity_type: "Project".to_string(),
            id: id.to_string(),
        })?;
        Ok(row_to_project(&row))
    }

    async fn list(&self) -> DbResult<Vec<Project>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM project ORDER BY created_at, id",
            PROJECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_project).collect())
    }

    async fn update(&self, project: &Project) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE project SET
                 title = ?, description = ?, status = ?, lead_user_id = ?, location = ?,
                 starts_on = ?, ends_on = ?, budget_total = ?, budget_spent = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&project.title)
        .bind(&project.description)
        .bind(project.status.to_string())
        .bind(&project.lead_user_id)
        .bind(&project.location)
        .bind(&project.starts_on)
        .bind(&project.ends_on)
        .bind(project.budget_total)
        .bind(project.budget_spent)
        .bind(&project.updated_at)
        .bind(&project.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity_type: "Project".to_string(),
                id: project.id.clone(),
            });
        }
        Ok(())
    }

    async fn list_matchable(&self) -> DbResult<Vec<Project>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM project p
             WHERE p.status IN ('recruiting', 'active')
               AND EXISTS (SELECT 1 FROM project_requirement r WHERE r.project_id = p.id)
             ORDER BY p.id",
            PROJECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_project).collect())
    }

    async fn set_requirements(&self, project_id: &str, skill_ids: &[String]) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from_sqlx)?;
        sqlx::query("DELETE FROM project_requirement WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_sqlx)?;
        for skill_id in skill_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO project_requirement (project_id, skill_id) VALUES (?, ?)",
            )
            .bind(project_id)
            .bind(skill_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_sqlx)?;
        }
        tx.commit().await.map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn get_requirements(&self, project_id: &str) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT skill_id FROM project_requirement WHERE project_id = ? ORDER BY skill_id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(|r| r.get("skill_id")).collect())
    }

    async fn create_application(&self, application: &Application) -> DbResult<()> {
        // One live application per (project, volunteer): a pending or
        // accepted row blocks re-application.
        let existing = sqlx::query(
            "SELECT id FROM application
             WHERE project_id = ? AND volunteer_id = ? AND status IN ('pending', 'accepted')",
        )
        .bind(&application.project_id)
        .bind(&application.volunteer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        if existing.is_some() {
            return Err(DbError::Constraint {
                message: "volunteer already has a live application for this project".to_string(),
            });
        }

        sqlx::query(
            "INSERT INTO application (id, project_id, volunteer_id, status, message, created_at, decided_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&application.id)
        .bind(&application.project_id)
        .bind(&application.volunteer_id)
        .bind(application.status.to_string())
        .bind(&application.message)
        .bind(&application.created_at)
        .bind(&application.decided_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn get_application(&self, id: &str) -> DbResult<Application> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM application WHERE id = ?",
            APPLICATION_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        let row = row.ok_or(DbError::NotFound {
            entity_type: "Application".to_string(),
            id: id.to_string(),
        })?;
        Ok(row_to_application(&row))
    }

    async fn list_applications(&self, project_id: &str) -> DbResult<Vec<Application>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM application WHERE project_id = ? ORDER BY created_at, id",
            APPLICATION_COLS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_application).collect())
    }

    async fn decide_application(
        &self,
        application_id: &str,
        to: ApplicationStatus,
    ) -> DbResult<bool> {
        let now = current_timestamp();
        let mut tx = self.pool.begin().await.map_err(DbError::from_sqlx)?;

        // Conditional update: only a pending application may transition.
        let result = sqlx::query(
            "UPDATE application SET status = ?, decided_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(to.to_string())
        .bind(&now)
        .bind(application_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from_sqlx)?;
        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(DbError::from_sqlx)?;
            return Ok(false);
        }

        if to == ApplicationStatus::Accepted {
            // Acceptance and enrollment commit or fail together, so
            // downstream membership checks never see an accepted
            // volunteer without a team row.
            let row = sqlx::query("SELECT project_id, volunteer_id FROM application WHERE id = ?")
                .bind(application_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(DbError::from_sqlx)?;
            let project_id: String = row.get("project_id");
            let volunteer_id: String = row.get("volunteer_id");

            sqlx::query(
                "INSERT INTO team_member (project_id, volunteer_id, status, joined_at, left_at)
                 VALUES (?, ?, 'active', ?, NULL)
                 ON CONFLICT(project_id, volunteer_id) DO UPDATE SET
                     status = 'active',
                     left_at = NULL",
            )
            .bind(&project_id)
            .bind(&volunteer_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_sqlx)?;
        }

        tx.commit().await.map_err(DbError::from_sqlx)?;
        Ok(true)
    }

    async fn get_team_member(
        &self,
        project_id: &str,
        volunteer_id: &str,
    ) -> DbResult<Option<TeamMember>> {
        let row = sqlx::query(
            "SELECT project_id, volunteer_id, status, joined_at, left_at
             FROM team_member WHERE project_id = ? AND volunteer_id = ?",
        )
        .bind(project_id)
        .bind(volunteer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.as_ref().map(row_to_member))
    }

    async fn list_team(&self, project_id: &str) -> DbResult<Vec<TeamMember>> {
        let rows = sqlx::query(
            "SELECT project_id, volunteer_id, status, joined_at, left_at
             FROM team_member WHERE project_id = ? ORDER BY joined_at, volunteer_id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_member).collect())
    }

    async fn leads_project_requiring(&self, user_id: &str, skill_id: &str) -> DbResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM project p
             JOIN project_requirement r ON r.project_id = p.id
             WHERE p.lead_user_id = ? AND r.skill_id = ?
             LIMIT 1",
        )
        .bind(user_id)
        .bind(skill_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.is_some())
    }
}
