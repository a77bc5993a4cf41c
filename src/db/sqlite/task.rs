//! SQLite TaskRepository implementation: tasks, activity, comments,
//! time logs.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{
    DbError, DbResult, Task, TaskActivity, TaskComment, TaskPriority, TaskRepository, TaskStatus,
    TaskTimeLog,
};

/// SQLx-backed task repository.
pub struct SqliteTaskRepository {
    pub(crate) pool: SqlitePool,
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Task {
    let status: String = row.get("status");
    let priority: String = row.get("priority");
    let labels_json: String = row.get("labels");
    Task {
        id: row.get("id"),
        project_id: row.get("project_id"),
        title: row.get("title"),
        description: row.get("description"),
        assignee_volunteer_id: row.get("assignee_volunteer_id"),
        creator_user_id: row.get("creator_user_id"),
        status: status.parse().unwrap_or(TaskStatus::Todo),
        priority: priority.parse().unwrap_or(TaskPriority::Medium),
        due_at: row.get("due_at"),
        labels: serde_json::from_str(&labels_json).unwrap_or_default(),
        started_at: row.get("started_at"),
        blocked_at: row.get("blocked_at"),
        completed_at: row.get("completed_at"),
        takeover_requested_at: row.get("takeover_requested_at"),
        blocked_reason: row.get("blocked_reason"),
        completion_note: row.get("completion_note"),
        takeover_reason: row.get("takeover_reason"),
        last_status_changed_by: row.get("last_status_changed_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_activity(row: &sqlx::sqlite::SqliteRow) -> TaskActivity {
    let from_status: String = row.get("from_status");
    let to_status: String = row.get("to_status");
    let context_json: Option<String> = row.get("context");
    TaskActivity {
        id: row.get("id"),
        task_id: row.get("task_id"),
        actor_user_id: row.get("actor_user_id"),
        from_status: from_status.parse().unwrap_or(TaskStatus::Todo),
        to_status: to_status.parse().unwrap_or(TaskStatus::Todo),
        context: context_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get("created_at"),
    }
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> TaskComment {
    TaskComment {
        id: row.get("id"),
        task_id: row.get("task_id"),
        author_user_id: row.get("author_user_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        edited_at: row.get("edited_at"),
    }
}

fn row_to_time_log(row: &sqlx::sqlite::SqliteRow) -> TaskTimeLog {
    TaskTimeLog {
        id: row.get("id"),
        task_id: row.get("task_id"),
        volunteer_id: row.get("volunteer_id"),
        hours: row.get("hours"),
        log_date: row.get("log_date"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

const TASK_COLS: &str = "id, project_id, title, description, assignee_volunteer_id, \
     creator_user_id, status, priority, due_at, labels, started_at, blocked_at, completed_at, \
     takeover_requested_at, blocked_reason, completion_note, takeover_reason, \
     last_status_changed_by, created_at, updated_at";

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DbResult<Task> {
        let id = if task.id.is_empty() {
            generate_entity_id()
        } else {
            task.id.clone()
        };
        let labels_json = serde_json::to_string(&task.labels).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            "INSERT INTO task
                 (id, project_id, title, description, assignee_volunteer_id, creator_user_id,
                  status, priority, due_at, labels, started_at, blocked_at, completed_at,
                  takeover_requested_at, blocked_reason, completion_note, takeover_reason,
                  last_status_changed_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&task.project_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assignee_volunteer_id)
        .bind(&task.creator_user_id)
        .bind(task.status.to_string())
        .bind(task.priority.to_string())
        .bind(&task.due_at)
        .bind(labels_json)
        .bind(&task.started_at)
        .bind(&task.blocked_at)
        .bind(&task.completed_at)
        .bind(&task.takeover_requested_at)
        .bind(&task.blocked_reason)
        .bind(&task.completion_note)
        .bind(&task.takeover_reason)
        .bind(&task.last_status_changed_by)
        .bind(&task.created_at)
        .bind(&task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;

        self.get(&id).await
    }

    async fn get(&self, id: &str) -> DbResult<Task> {
        let row = sqlx::query(&format!("SELECT {} FROM task WHERE id = ?", TASK_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from_sqlx)?;
        let row = row.ok_or(DbError::NotFound {
            entity_type: "Task".to_string(),
            id: id.to_string(),
        })?;
        Ok(row_to_task(&row))
    }

    async fn list_by_project(&self, project_id: &str) -> DbResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM task WHERE project_id = ? ORDER BY created_at, id",
            TASK_COLS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_task).collect())
    }

    async fn update(&self, task: &Task) -> DbResult<()> {
        let labels_json = serde_json::to_string(&task.labels).unwrap_or_else(|_| "[]".to_string());
        let result = sqlx::query(
            "UPDATE task SET
                 title = ?, description = ?, assignee_volunteer_id = ?, status = ?, priority = ?,
                 due_at = ?, labels = ?, started_at = ?, blocked_at = ?, completed_at = ?,
                 takeover_requested_at = ?, blocked_reason = ?, completion_note = ?,
                 takeover_reason = ?, last_status_changed_by = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assignee_volunteer_id)
        .bind(task.status.to_string())
        .bind(task.priority.to_string())
        .bind(&task.due_at)
        .bind(labels_json)
        .bind(&task.started_at)
        .bind(&task.blocked_at)
        .bind(&task.completed_at)
        .bind(&task.takeover_requested_at)
        .bind(&task.blocked_reason)
        .bind(&task.completion_note)
        .bind(&task.takeover_reason)
        .bind(&task.last_status_changed_by)
        .bind(&task.updated_at)
        .bind(&task.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                entity_type: "Task".to_string(),
                id: task.id.clone(),
            });
        }
        Ok(())
    }

    async fn insert_activity(&self, activity: &TaskActivity) -> DbResult<()> {
        let context_json = activity
            .context
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "null".to_string()));
        sqlx::query(
            "INSERT INTO task_activity
                 (id, task_id, actor_user_id, from_status, to_status, context, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&activity.id)
        .bind(&activity.task_id)
        .bind(&activity.actor_user_id)
        .bind(activity.from_status.to_string())
        .bind(activity.to_status.to_string())
        .bind(context_json)
        .bind(&activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn list_activity(&self, task_id: &str) -> DbResult<Vec<TaskActivity>> {
        let rows = sqlx::query(
            "SELECT id, task_id, actor_user_id, from_status, to_status, context, created_at
             FROM task_activity WHERE task_id = ? ORDER BY created_at, id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_activity).collect())
    }

    async fn insert_comment(&self, comment: &TaskComment) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO task_comment (id, task_id, author_user_id, body, created_at, edited_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.id)
        .bind(&comment.task_id)
        .bind(&comment.author_user_id)
        .bind(&comment.body)
        .bind(&comment.created_at)
        .bind(&comment.edited_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn list_comments(&self, task_id: &str) -> DbResult<Vec<TaskComment>> {
        let rows = sqlx::query(
            "SELECT id, task_id, author_user_id, body, created_at, edited_at
             FROM task_comment WHERE task_id = ? ORDER BY created_at, id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_comment).collect())
    }

    async fn insert_time_log(&self, log: &TaskTimeLog) -> DbResult<()> {
        if log.hours <= 0.0 {
            return Err(DbError::Validation {
                message: "time log hours must be positive".to_string(),
            });
        }
        let id = if log.id.is_empty() {
            generate_entity_id()
        } else {
            log.id.clone()
        };
        let created_at = if log.created_at.is_empty() {
            current_timestamp()
        } else {
            log.created_at.clone()
        };
        sqlx::query(
            "INSERT INTO task_time_log
                 (id, task_id, volunteer_id, hours, log_date, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&log.task_id)
        .bind(&log.volunteer_id)
        .bind(log.hours)
        .bind(&log.log_date)
        .bind(&log.description)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(())
    }

    async fn list_time_logs(&self, task_id: &str) -> DbResult<Vec<TaskTimeLog>> {
        let rows = sqlx::query(
            "SELECT id, task_id, volunteer_id, hours, log_date, description, created_at
             FROM task_time_log WHERE task_id = ? ORDER BY log_date, created_at, id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(rows.iter().map(row_to_time_log).collect())
    }

    async fn total_hours(&self, task_id: &str) -> DbResult<f64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(hours), 0.0) AS total FROM task_time_log WHERE task_id = ?",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.get("total"))
    }

    async fn project_hours(&self, project_id: &str) -> DbResult<f64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(l.hours), 0.0) AS total
             FROM task_time_log l
             JOIN task t ON t.id = l.task_id
             WHERE t.project_id = ?",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.get("total"))
    }

    async fn volunteer_project_hours(
        &self,
        volunteer_id: &str,
        project_id: &str,
    ) -> DbResult<f64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(l.hours), 0.0) AS total
             FROM task_time_log l
             JOIN task t ON t.id = l.task_id
             WHERE l.volunteer_id = ? AND t.project_id = ?",
        )
        .bind(volunteer_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_sqlx)?;
        Ok(row.get("total"))
    }
}
