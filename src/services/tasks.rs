//! Task lifecycle.
//!
//! The status machine is a transition table over (from, to, actor
//! relation); every transition appends a TaskActivity row and the
//! blocked/done/takeover transitions emit a status message into the
//! project log, authored by the acting user.

use serde_json::json;

use crate::auth::{RequestContext, is_team_lead_of, is_team_member};
use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{
    Database, Message, MessageType, Project, Task, TaskActivity, TaskComment, TaskPriority,
    TaskStatus, TaskTimeLog,
};
use crate::error::{Error, Result};

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub assignee_volunteer_id: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_at: Option<String>,
    pub labels: Vec<String>,
}

/// Mutable fields outside the status machine.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub due_at: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
}

/// How the actor relates to a task, resolved once per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActorRelation {
    is_assignee: bool,
    is_lead: bool,
    /// Active team member (or lead/admin) with a volunteer profile.
    is_member_volunteer: bool,
}

/// Task domain service.
pub struct TaskService<'a, D> {
    db: &'a D,
}

impl<'a, D: Database> TaskService<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self { db }
    }

    pub async fn create_task(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        fields: NewTask,
    ) -> Result<Task> {
        ctx.ensure_live()?;
        let project = self.db.projects().get(project_id).await?;
        if !is_team_lead_of(ctx, &project) {
            return Err(Error::denied("only the project lead can create tasks"));
        }
        if fields.title.trim().is_empty() {
            return Err(Error::invalid_input("task title cannot be empty"));
        }

        let now = current_timestamp();
        let task = Task {
            id: generate_entity_id(),
            project_id: project.id.clone(),
            title: fields.title,
            description: fields.description,
            assignee_volunteer_id: fields.assignee_volunteer_id,
            creator_user_id: ctx.user_id.clone(),
            status: TaskStatus::Todo,
            priority: fields.priority.unwrap_or_default(),
            due_at: fields.due_at,
            labels: fields.labels,
            started_at: None,
            blocked_at: None,
            completed_at: None,
            takeover_requested_at: None,
            blocked_reason: None,
            completion_note: None,
            takeover_reason: None,
            last_status_changed_by: None,
            created_at: now.clone(),
            updated_at: now,
        };
        Ok(self.db.tasks().create(&task).await?)
    }

    /// Lead-driven assignment. The volunteer must be an active member of
    /// the task's project.
    pub async fn assign(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        volunteer_id: &str,
    ) -> Result<Task> {
        ctx.ensure_live()?;
        let mut task = self.db.tasks().get(task_id).await?;
        let project = self.db.projects().get(&task.project_id).await?;
        if !is_team_lead_of(ctx, &project) {
            return Err(Error::denied("only the project lead can assign tasks"));
        }
        self.ensure_active_member(&project.id, volunteer_id).await?;

        task.assignee_volunteer_id = Some(volunteer_id.to_string());
        task.updated_at = current_timestamp();
        self.db.tasks().update(&task).await?;
        Ok(task)
    }

    /// Volunteer takes an unassigned task. Fails with a state violation
    /// when the task already has an assignee.
    pub async fn self_assign(&self, ctx: &RequestContext, task_id: &str) -> Result<Task> {
        ctx.ensure_live()?;
        let mut task = self.db.tasks().get(task_id).await?;
        let project = self.db.projects().get(&task.project_id).await?;
        let volunteer_id = ctx
            .volunteer_id
            .as_deref()
            .ok_or_else(|| Error::denied("caller has no volunteer profile"))?;
        if !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller is not a member of the project team"));
        }
        if task.assignee_volunteer_id.is_some() {
            return Err(Error::state("task is already assigned"));
        }

        task.assignee_volunteer_id = Some(volunteer_id.to_string());
        task.updated_at = current_timestamp();
        self.db.tasks().update(&task).await?;
        Ok(task)
    }

    pub async fn update_fields(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Task> {
        ctx.ensure_live()?;
        let mut task = self.db.tasks().get(task_id).await?;
        let project = self.db.projects().get(&task.project_id).await?;
        let relation = self.actor_relation(ctx, &task, &project).await?;
        if !relation.is_lead && !relation.is_assignee {
            return Err(Error::denied("only the assignee or lead can edit a task"));
        }

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(Error::invalid_input("task title cannot be empty"));
            }
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_at) = patch.due_at {
            task.due_at = due_at;
        }
        if let Some(labels) = patch.labels {
            task.labels = labels;
        }
        task.updated_at = current_timestamp();
        self.db.tasks().update(&task).await?;
        Ok(task)
    }

    /// Drive the status machine. `note` lands in the reason field of the
    /// target state and in the activity context.
    pub async fn transition(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        to: TaskStatus,
        note: Option<&str>,
    ) -> Result<Task> {
        ctx.ensure_live()?;
        let mut task = self.db.tasks().get(task_id).await?;
        let project = self.db.projects().get(&task.project_id).await?;
        let relation = self.actor_relation(ctx, &task, &project).await?;
        let from = task.status;

        self.authorize_transition(&task, from, to, relation, ctx)?;

        let now = current_timestamp();
        match to {
            TaskStatus::InProgress => {
                // First entry only; reopen clears it so a fresh start
                // stamps a fresh time.
                if task.started_at.is_none() {
                    task.started_at = Some(now.clone());
                }
                if from == TaskStatus::Done {
                    // Reopen: the done timestamps no longer describe the
                    // task, so both reset.
                    task.started_at = Some(now.clone());
                    task.completed_at = None;
                    task.completion_note = None;
                }
                if from == TaskStatus::Todo && task.assignee_volunteer_id.is_none() {
                    // Self-assigning start: the acting volunteer becomes
                    // the assignee.
                    task.assignee_volunteer_id = ctx.volunteer_id.clone();
                }
                if from == TaskStatus::TakeoverRequested
                    && !relation.is_assignee
                    && let Some(volunteer_id) = ctx.volunteer_id.as_deref()
                    && !relation.is_lead
                {
                    // A different volunteer picked the task up.
                    task.assignee_volunteer_id = Some(volunteer_id.to_string());
                }
                task.blocked_at = None;
                task.blocked_reason = None;
                task.takeover_requested_at = None;
                task.takeover_reason = None;
            }
            TaskStatus::Done => {
                task.completed_at = Some(now.clone());
                task.completion_note = note.map(str::to_string);
            }
            TaskStatus::Blocked => {
                task.blocked_at = Some(now.clone());
                task.blocked_reason = note.map(str::to_string);
            }
            TaskStatus::TakeoverRequested => {
                task.takeover_requested_at = Some(now.clone());
                task.takeover_reason = note.map(str::to_string);
                task.blocked_at = None;
                task.blocked_reason = None;
            }
            TaskStatus::Todo => {
                // Lead reassign out of a takeover request.
                task.assignee_volunteer_id = None;
                task.takeover_requested_at = None;
                task.takeover_reason = None;
            }
        }
        task.status = to;
        task.last_status_changed_by = Some(ctx.user_id.clone());
        task.updated_at = now.clone();
        self.db.tasks().update(&task).await?;

        self.db
            .tasks()
            .insert_activity(&TaskActivity {
                id: generate_entity_id(),
                task_id: task.id.clone(),
                actor_user_id: ctx.user_id.clone(),
                from_status: from,
                to_status: to,
                context: note.map(|n| json!({ "note": n })),
                created_at: now.clone(),
            })
            .await?;

        if let Some(message_type) = status_message_type(to) {
            self.db
                .messages()
                .insert(&Message {
                    id: generate_entity_id(),
                    project_id: task.project_id.clone(),
                    sender_user_id: ctx.user_id.clone(),
                    recipient_user_id: None,
                    task_id: Some(task.id.clone()),
                    message_type,
                    body: status_message_body(&task, to, note),
                    created_at: now,
                    edited_at: None,
                    deleted_at: None,
                })
                .await?;
        }

        Ok(task)
    }

    pub async fn log_time(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        hours: f64,
        log_date: &str,
        description: Option<&str>,
    ) -> Result<TaskTimeLog> {
        ctx.ensure_live()?;
        if hours <= 0.0 {
            return Err(Error::invalid_input("hours must be positive"));
        }
        let task = self.db.tasks().get(task_id).await?;
        let volunteer_id = ctx
            .volunteer_id
            .as_deref()
            .ok_or_else(|| Error::denied("caller has no volunteer profile"))?;
        if task.assignee_volunteer_id.as_deref() != Some(volunteer_id) {
            return Err(Error::denied("only the assignee can log time on a task"));
        }

        let log = TaskTimeLog {
            id: generate_entity_id(),
            task_id: task.id.clone(),
            volunteer_id: volunteer_id.to_string(),
            hours,
            log_date: log_date.to_string(),
            description: description.map(str::to_string),
            created_at: current_timestamp(),
        };
        self.db.tasks().insert_time_log(&log).await?;
        Ok(log)
    }

    pub async fn total_hours(&self, task_id: &str) -> Result<f64> {
        Ok(self.db.tasks().total_hours(task_id).await?)
    }

    pub async fn add_comment(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        body: &str,
    ) -> Result<TaskComment> {
        ctx.ensure_live()?;
        if body.trim().is_empty() {
            return Err(Error::invalid_input("comment body cannot be empty"));
        }
        let task = self.db.tasks().get(task_id).await?;
        let project = self.db.projects().get(&task.project_id).await?;
        if !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller is not a member of the project team"));
        }

        let comment = TaskComment {
            id: generate_entity_id(),
            task_id: task.id.clone(),
            author_user_id: ctx.user_id.clone(),
            body: body.to_string(),
            created_at: current_timestamp(),
            edited_at: None,
        };
        self.db.tasks().insert_comment(&comment).await?;
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        ctx: &RequestContext,
        task_id: &str,
    ) -> Result<Vec<TaskComment>> {
        let task = self.db.tasks().get(task_id).await?;
        let project = self.db.projects().get(&task.project_id).await?;
        if !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller is not a member of the project team"));
        }
        Ok(self.db.tasks().list_comments(task_id).await?)
    }

    async fn actor_relation(
        &self,
        ctx: &RequestContext,
        task: &Task,
        project: &Project,
    ) -> Result<ActorRelation> {
        let is_assignee = match (&task.assignee_volunteer_id, &ctx.volunteer_id) {
            (Some(assignee), Some(own)) => assignee == own,
            _ => false,
        };
        Ok(ActorRelation {
            is_assignee,
            is_lead: is_team_lead_of(ctx, project),
            is_member_volunteer: ctx.volunteer_id.is_some()
                && is_team_member(self.db, ctx, project).await?,
        })
    }

    /// The transition table: which (from, to) edges exist and who may
    /// drive them.
    fn authorize_transition(
        &self,
        task: &Task,
        from: TaskStatus,
        to: TaskStatus,
        relation: ActorRelation,
        ctx: &RequestContext,
    ) -> Result<()> {
        use TaskStatus::*;

        let permitted = match (from, to) {
            (Todo, InProgress) => {
                relation.is_assignee
                    || relation.is_lead
                    || (task.assignee_volunteer_id.is_none() && relation.is_member_volunteer)
            }
            (InProgress, Done) => relation.is_assignee || relation.is_lead,
            (InProgress, Blocked) => relation.is_assignee,
            (InProgress, TakeoverRequested) => relation.is_assignee,
            (Blocked, InProgress) => relation.is_assignee || relation.is_lead,
            (Blocked, TakeoverRequested) => relation.is_assignee,
            (TakeoverRequested, InProgress) => {
                // Lead reassignment, or a different member volunteer
                // picking the task up.
                relation.is_lead || (relation.is_member_volunteer && !relation.is_assignee)
            }
            (TakeoverRequested, Todo) => relation.is_lead,
            (Done, InProgress) => relation.is_lead || ctx.is_admin(),
            _ => {
                return Err(Error::state(format!(
                    "no transition from {} to {}",
                    from, to
                )));
            }
        };
        if !permitted {
            return Err(Error::denied(format!(
                "caller may not move this task from {} to {}",
                from, to
            )));
        }
        Ok(())
    }

    async fn ensure_active_member(&self, project_id: &str, volunteer_id: &str) -> Result<()> {
        let member = self
            .db
            .projects()
            .get_team_member(project_id, volunteer_id)
            .await?;
        match member {
            Some(m) if m.status == crate::db::MemberStatus::Active => Ok(()),
            _ => Err(Error::invalid_input(
                "volunteer is not an active member of the project team",
            )),
        }
    }
}

fn status_message_type(to: TaskStatus) -> Option<MessageType> {
    match to {
        TaskStatus::Done => Some(MessageType::TaskDone),
        TaskStatus::Blocked => Some(MessageType::TaskBlocked),
        TaskStatus::TakeoverRequested => Some(MessageType::TaskTakeover),
        _ => None,
    }
}

fn status_message_body(task: &Task, to: TaskStatus, note: Option<&str>) -> String {
    let headline = match to {
        TaskStatus::Done => format!("Task \"{}\" is done.", task.title),
        TaskStatus::Blocked => format!("Task \"{}\" is blocked.", task.title),
        TaskStatus::TakeoverRequested => {
            format!("Task \"{}\" needs a new owner.", task.title)
        }
        _ => format!("Task \"{}\" changed status.", task.title),
    };
    match note {
        Some(note) if !note.trim().is_empty() => format!("{} {}", headline, note),
        _ => headline,
    }
}
