//! Task lifecycle handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use super::ErrorResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::auth::{RequestContext, is_team_member};
use crate::db::{
    Database, Task, TaskActivity, TaskComment, TaskPriority, TaskStatus, TaskTimeLog,
};
use crate::error::Error;
use crate::services::TaskService;
use crate::services::tasks::{NewTask, TaskPatch};

// =============================================================================
// DTOs
// =============================================================================

#[derive(Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: String,
    pub project_id: String,
    #[schema(example = "Design flyers")]
    pub title: String,
    pub description: Option<String>,
    pub assignee_volunteer_id: Option<String>,
    pub creator_user_id: String,
    #[schema(example = "in_progress")]
    pub status: String,
    #[schema(example = "medium")]
    pub priority: String,
    pub due_at: Option<String>,
    pub labels: Vec<String>,
    pub started_at: Option<String>,
    pub blocked_at: Option<String>,
    pub completed_at: Option<String>,
    pub takeover_requested_at: Option<String>,
    pub blocked_reason: Option<String>,
    pub completion_note: Option<String>,
    pub takeover_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            project_id: t.project_id,
            title: t.title,
            description: t.description,
            assignee_volunteer_id: t.assignee_volunteer_id,
            creator_user_id: t.creator_user_id,
            status: t.status.to_string(),
            priority: t.priority.to_string(),
            due_at: t.due_at,
            labels: t.labels,
            started_at: t.started_at,
            blocked_at: t.blocked_at,
            completed_at: t.completed_at,
            takeover_requested_at: t.takeover_requested_at,
            blocked_reason: t.blocked_reason,
            completion_note: t.completion_note,
            takeover_reason: t.takeover_reason,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    #[schema(example = "Design flyers")]
    pub title: String,
    pub description: Option<String>,
    pub assignee_volunteer_id: Option<String>,
    #[schema(example = "high")]
    pub priority: Option<String>,
    pub due_at: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_at: Option<String>,
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTaskRequest {
    pub volunteer_id: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TransitionRequest {
    /// Reason or completion note recorded with the transition.
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogTimeRequest {
    #[schema(example = 2.5)]
    pub hours: f64,
    #[schema(example = "2026-07-01")]
    pub log_date: String,
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TimeLogResponse {
    pub id: String,
    pub task_id: String,
    pub volunteer_id: String,
    pub hours: f64,
    pub log_date: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl From<TaskTimeLog> for TimeLogResponse {
    fn from(l: TaskTimeLog) -> Self {
        Self {
            id: l.id,
            task_id: l.task_id,
            volunteer_id: l.volunteer_id,
            hours: l.hours,
            log_date: l.log_date,
            description: l.description,
            created_at: l.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TaskHoursResponse {
    pub task_id: String,
    pub total_hours: f64,
    pub logs: Vec<TimeLogResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: String,
    pub task_id: String,
    pub author_user_id: String,
    pub body: String,
    pub created_at: String,
    pub edited_at: Option<String>,
}

impl From<TaskComment> for CommentResponse {
    fn from(c: TaskComment) -> Self {
        Self {
            id: c.id,
            task_id: c.task_id,
            author_user_id: c.author_user_id,
            body: c.body,
            created_at: c.created_at,
            edited_at: c.edited_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ActivityResponse {
    pub id: String,
    pub task_id: String,
    pub actor_user_id: String,
    pub from_status: String,
    pub to_status: String,
    #[schema(value_type = Option<Object>)]
    pub context: Option<serde_json::Value>,
    pub created_at: String,
}

impl From<TaskActivity> for ActivityResponse {
    fn from(a: TaskActivity) -> Self {
        Self {
            id: a.id,
            task_id: a.task_id,
            actor_user_id: a.actor_user_id,
            from_status: a.from_status.to_string(),
            to_status: a.to_status.to_string(),
            context: a.context,
            created_at: a.created_at,
        }
    }
}

fn parse_priority(raw: Option<&str>) -> Result<Option<TaskPriority>, ApiError> {
    raw.map(|p| p.parse().map_err(|e: String| ApiError::bad_request(e)))
        .transpose()
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a task in the project (lead only).
#[utoipa::path(
    post,
    path = "/projects/{id}/tasks",
    tag = "tasks",
    params(("id" = String, Path, description = "Project ID")),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Created", body = TaskResponse),
        (status = 403, description = "Not the project lead", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn create_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let task = TaskService::new(state.db())
        .create_task(
            &ctx,
            &id,
            NewTask {
                title: request.title,
                description: request.description,
                assignee_volunteer_id: request.assignee_volunteer_id,
                priority: parse_priority(request.priority.as_deref())?,
                due_at: request.due_at,
                labels: request.labels,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task.into())))
}

/// Tasks in a project (team members).
#[utoipa::path(
    get,
    path = "/projects/{id}/tasks",
    tag = "tasks",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Tasks, oldest first", body = [TaskResponse]),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn list_tasks<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let project = state.db().projects().get(&id).await?;
    if !is_team_member(state.db(), &ctx, &project).await? {
        return Err(Error::denied("caller is not a member of the project team").into());
    }
    let tasks = state.db().tasks().list_by_project(&id).await?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// One task (team members).
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "The task", body = TaskResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn get_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = state.db().tasks().get(&id).await?;
    let project = state.db().projects().get(&task.project_id).await?;
    if !is_team_member(state.db(), &ctx, &project).await? {
        return Err(Error::denied("caller is not a member of the project team").into());
    }
    Ok(Json(task.into()))
}

/// Edit task fields outside the status machine (assignee or lead).
#[utoipa::path(
    patch,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated", body = TaskResponse),
        (status = 403, description = "Not the assignee or lead", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn update_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = TaskService::new(state.db())
        .update_fields(
            &ctx,
            &id,
            TaskPatch {
                title: request.title,
                description: request.description.map(Some),
                priority: parse_priority(request.priority.as_deref())?,
                due_at: request.due_at.map(Some),
                labels: request.labels,
            },
        )
        .await?;
    Ok(Json(task.into()))
}

/// Lead assigns a task to a team volunteer.
#[utoipa::path(
    post,
    path = "/tasks/{id}/assign",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = AssignTaskRequest,
    responses(
        (status = 200, description = "Assigned", body = TaskResponse),
        (status = 403, description = "Not the project lead", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn assign_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<AssignTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = TaskService::new(state.db())
        .assign(&ctx, &id, &request.volunteer_id)
        .await?;
    Ok(Json(task.into()))
}

/// Volunteer takes an unassigned task.
#[utoipa::path(
    post,
    path = "/tasks/{id}/self-assign",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Assigned to caller", body = TaskResponse),
        (status = 409, description = "Already assigned", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn self_assign_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = TaskService::new(state.db()).self_assign(&ctx, &id).await?;
    Ok(Json(task.into()))
}

async fn transition<D: Database + 'static>(
    state: &AppState<D>,
    ctx: &RequestContext,
    id: &str,
    to: TaskStatus,
    note: Option<&str>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = TaskService::new(state.db())
        .transition(ctx, id, to, note)
        .await?;
    Ok(Json(task.into()))
}

/// Start (or reopen) work: transition to in_progress.
#[utoipa::path(
    post,
    path = "/tasks/{id}/start",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "In progress", body = TaskResponse),
        (status = 409, description = "Transition not permitted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn start_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    transition(&state, &ctx, &id, TaskStatus::InProgress, request.note.as_deref()).await
}

/// Complete the task; emits a task_done message.
#[utoipa::path(
    post,
    path = "/tasks/{id}/done",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Done", body = TaskResponse),
        (status = 409, description = "Transition not permitted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn complete_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    transition(&state, &ctx, &id, TaskStatus::Done, request.note.as_deref()).await
}

/// Block the task; emits a task_blocked message.
#[utoipa::path(
    post,
    path = "/tasks/{id}/blocked",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Blocked", body = TaskResponse),
        (status = 409, description = "Transition not permitted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn block_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    transition(&state, &ctx, &id, TaskStatus::Blocked, request.note.as_deref()).await
}

/// Request a takeover; emits a task_takeover message.
#[utoipa::path(
    post,
    path = "/tasks/{id}/takeover",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Takeover requested", body = TaskResponse),
        (status = 409, description = "Transition not permitted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn request_takeover<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    transition(&state, &ctx, &id, TaskStatus::TakeoverRequested, request.note.as_deref()).await
}

/// Lead resolves a takeover request back to the todo pool.
#[utoipa::path(
    post,
    path = "/tasks/{id}/reassign",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Back in the todo pool", body = TaskResponse),
        (status = 409, description = "Transition not permitted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn reassign_task<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    transition(&state, &ctx, &id, TaskStatus::Todo, request.note.as_deref()).await
}

/// Assignee logs hours against the task.
#[utoipa::path(
    post,
    path = "/tasks/{id}/time-logs",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = LogTimeRequest,
    responses(
        (status = 201, description = "Logged", body = TimeLogResponse),
        (status = 400, description = "Non-positive hours", body = ErrorResponse),
        (status = 403, description = "Not the assignee", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn log_time<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<LogTimeRequest>,
) -> Result<(StatusCode, Json<TimeLogResponse>), ApiError> {
    let log = TaskService::new(state.db())
        .log_time(
            &ctx,
            &id,
            request.hours,
            &request.log_date,
            request.description.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(log.into())))
}

/// Time logs plus the task's total hours.
#[utoipa::path(
    get,
    path = "/tasks/{id}/time-logs",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Logs and total", body = TaskHoursResponse),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn list_time_logs<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<TaskHoursResponse>, ApiError> {
    let task = state.db().tasks().get(&id).await?;
    let project = state.db().projects().get(&task.project_id).await?;
    if !is_team_member(state.db(), &ctx, &project).await? {
        return Err(Error::denied("caller is not a member of the project team").into());
    }
    let logs = state.db().tasks().list_time_logs(&id).await?;
    let total_hours = state.db().tasks().total_hours(&id).await?;
    Ok(Json(TaskHoursResponse {
        task_id: id,
        total_hours,
        logs: logs.into_iter().map(TimeLogResponse::from).collect(),
    }))
}

/// Comment on a task (team members).
#[utoipa::path(
    post,
    path = "/tasks/{id}/comments",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Created", body = CommentResponse),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn add_comment<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let comment = TaskService::new(state.db())
        .add_comment(&ctx, &id, &request.body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// Comments on a task, oldest first.
#[utoipa::path(
    get,
    path = "/tasks/{id}/comments",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Comments", body = [CommentResponse]),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn list_comments<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let comments = TaskService::new(state.db()).list_comments(&ctx, &id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

/// Status history for a task, oldest first.
#[utoipa::path(
    get,
    path = "/tasks/{id}/activity",
    tag = "tasks",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Activity entries", body = [ActivityResponse]),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn list_activity<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<ActivityResponse>>, ApiError> {
    let task = state.db().tasks().get(&id).await?;
    let project = state.db().projects().get(&task.project_id).await?;
    if !is_team_member(state.db(), &ctx, &project).await? {
        return Err(Error::denied("caller is not a member of the project team").into());
    }
    let entries = state.db().tasks().list_activity(&id).await?;
    Ok(Json(entries.into_iter().map(ActivityResponse::from).collect()))
}
