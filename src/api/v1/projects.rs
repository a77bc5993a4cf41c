//! Project, requirement, application, and team handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use super::volunteers::{MatchQuery, MatchResponse};
use super::ErrorResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::auth::{RequestContext, is_team_lead_of, is_team_member};
use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{
    Application, ApplicationStatus, Database, Project, ProjectStatus, ROLE_ADMIN,
    ROLE_CAMPAIGN_MANAGER, TeamMember,
};
use crate::error::Error;
use crate::services::EnrollmentService;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Serialize, ToSchema)]
pub struct ProjectResponse {
    pub id: String,
    #[schema(example = "River Cleanup")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "recruiting")]
    pub status: String,
    pub lead_user_id: Option<String>,
    pub creator_user_id: String,
    pub location: Option<String>,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
    pub budget_total: Option<f64>,
    pub budget_spent: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Project> for ProjectResponse {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            title: p.title,
            description: p.description,
            status: p.status.to_string(),
            lead_user_id: p.lead_user_id,
            creator_user_id: p.creator_user_id,
            location: p.location,
            starts_on: p.starts_on,
            ends_on: p.ends_on,
            budget_total: p.budget_total,
            budget_spent: p.budget_spent,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    #[schema(example = "River Cleanup")]
    pub title: String,
    pub description: Option<String>,
    pub lead_user_id: Option<String>,
    pub location: Option<String>,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
    pub budget_total: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PatchProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(example = "recruiting")]
    pub status: Option<String>,
    pub lead_user_id: Option<String>,
    pub location: Option<String>,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
    pub budget_total: Option<f64>,
    pub budget_spent: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyRequest {
    pub message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ApplicationResponse {
    pub id: String,
    pub project_id: String,
    pub volunteer_id: String,
    #[schema(example = "pending")]
    pub status: String,
    pub message: Option<String>,
    pub created_at: String,
    pub decided_at: Option<String>,
}

impl From<Application> for ApplicationResponse {
    fn from(a: Application) -> Self {
        Self {
            id: a.id,
            project_id: a.project_id,
            volunteer_id: a.volunteer_id,
            status: a.status.to_string(),
            message: a.message,
            created_at: a.created_at,
            decided_at: a.decided_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecideApplicationRequest {
    #[schema(example = "accepted")]
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct TeamMemberResponse {
    pub project_id: String,
    pub volunteer_id: String,
    #[schema(example = "active")]
    pub status: String,
    pub joined_at: String,
    pub left_at: Option<String>,
}

impl From<TeamMember> for TeamMemberResponse {
    fn from(m: TeamMember) -> Self {
        Self {
            project_id: m.project_id,
            volunteer_id: m.volunteer_id,
            status: m.status.to_string(),
            joined_at: m.joined_at,
            left_at: m.left_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProjectHoursResponse {
    pub project_id: String,
    pub total_hours: f64,
    /// Hours logged by the caller's own volunteer profile, when one
    /// exists.
    pub my_hours: Option<f64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a project in draft status.
#[utoipa::path(
    post,
    path = "/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Created", body = ProjectResponse),
        (status = 403, description = "Not a campaign manager", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn create_project<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    if !ctx.has_any_role(&[ROLE_ADMIN, ROLE_CAMPAIGN_MANAGER]) {
        return Err(Error::denied("only campaign managers can create projects").into());
    }
    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("project title cannot be empty"));
    }

    let now = current_timestamp();
    let project = Project {
        id: generate_entity_id(),
        title: request.title,
        description: request.description,
        status: ProjectStatus::Draft,
        lead_user_id: request.lead_user_id,
        creator_user_id: ctx.user_id.clone(),
        location: request.location,
        starts_on: request.starts_on,
        ends_on: request.ends_on,
        budget_total: request.budget_total,
        budget_spent: None,
        created_at: now.clone(),
        updated_at: now,
    };
    state.db().projects().create(&project).await?;
    Ok((StatusCode::CREATED, Json(project.into())))
}

/// All projects.
#[utoipa::path(
    get,
    path = "/projects",
    tag = "projects",
    responses((status = 200, description = "Projects", body = [ProjectResponse]))
)]
#[instrument(skip(state, _ctx))]
pub async fn list_projects<D: Database + 'static>(
    State(state): State<AppState<D>>,
    _ctx: RequestContext,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let projects = state.db().projects().list().await?;
    Ok(Json(
        projects.into_iter().map(ProjectResponse::from).collect(),
    ))
}

/// One project.
#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "The project", body = ProjectResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _ctx))]
pub async fn get_project<D: Database + 'static>(
    State(state): State<AppState<D>>,
    _ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project = state.db().projects().get(&id).await?;
    Ok(Json(project.into()))
}

/// Update project fields and drive the restricted status machine.
#[utoipa::path(
    patch,
    path = "/projects/{id}",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID")),
    request_body = PatchProjectRequest,
    responses(
        (status = 200, description = "Updated", body = ProjectResponse),
        (status = 403, description = "No authority over the project", body = ErrorResponse),
        (status = 409, description = "Disallowed status transition", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn patch_project<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<PatchProjectRequest>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let mut project = state.db().projects().get(&id).await?;
    let is_creator = project.creator_user_id == ctx.user_id;
    if !is_team_lead_of(&ctx, &project) && !is_creator {
        return Err(Error::denied("no authority over this project").into());
    }

    if let Some(status) = request.status.as_deref() {
        let to: ProjectStatus = status
            .parse()
            .map_err(|e: String| ApiError::bad_request(e))?;
        if to != project.status && !project.status.can_transition_to(to) {
            return Err(Error::state(format!(
                "project cannot move from {} to {}",
                project.status, to
            ))
            .into());
        }
        project.status = to;
    }
    if let Some(title) = request.title {
        if title.trim().is_empty() {
            return Err(ApiError::bad_request("project title cannot be empty"));
        }
        project.title = title;
    }
    if let Some(description) = request.description {
        project.description = Some(description);
    }
    if let Some(lead_user_id) = request.lead_user_id {
        project.lead_user_id = Some(lead_user_id);
    }
    if let Some(location) = request.location {
        project.location = Some(location);
    }
    if let Some(starts_on) = request.starts_on {
        project.starts_on = Some(starts_on);
    }
    if let Some(ends_on) = request.ends_on {
        project.ends_on = Some(ends_on);
    }
    if let Some(budget_total) = request.budget_total {
        project.budget_total = Some(budget_total);
    }
    if let Some(budget_spent) = request.budget_spent {
        project.budget_spent = Some(budget_spent);
    }
    project.updated_at = current_timestamp();
    state.db().projects().update(&project).await?;
    Ok(Json(project.into()))
}

/// Replace the project's requirement skill set.
#[utoipa::path(
    put,
    path = "/projects/{id}/skills",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID")),
    request_body = [String],
    responses(
        (status = 200, description = "The requirement set", body = [String]),
        (status = 403, description = "No authority over the project", body = ErrorResponse),
        (status = 404, description = "Unknown skill id", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, skill_ids))]
pub async fn put_requirements<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(skill_ids): Json<Vec<String>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let project = state.db().projects().get(&id).await?;
    if !is_team_lead_of(&ctx, &project) && project.creator_user_id != ctx.user_id {
        return Err(Error::denied("no authority over this project").into());
    }
    for skill_id in &skill_ids {
        state.db().skills().get(skill_id).await?;
    }
    state.db().projects().set_requirements(&id, &skill_ids).await?;
    Ok(Json(state.db().projects().get_requirements(&id).await?))
}

/// The project's requirement skill set.
#[utoipa::path(
    get,
    path = "/projects/{id}/skills",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID")),
    responses((status = 200, description = "Requirement skill ids", body = [String]))
)]
#[instrument(skip(state, _ctx))]
pub async fn get_requirements<D: Database + 'static>(
    State(state): State<AppState<D>>,
    _ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    state.db().projects().get(&id).await?;
    Ok(Json(state.db().projects().get_requirements(&id).await?))
}

/// Candidate list for a project by descending score.
#[utoipa::path(
    get,
    path = "/projects/{id}/matches",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID"), MatchQuery),
    responses(
        (status = 200, description = "Match records, descending score", body = [MatchResponse]),
        (status = 403, description = "No authority over the project", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn project_matches<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<Vec<MatchResponse>>, ApiError> {
    let project = state.db().projects().get(&id).await?;
    if !is_team_lead_of(&ctx, &project) {
        return Err(Error::denied("no authority over this project").into());
    }
    let records = state
        .db()
        .matches()
        .for_project(&id, query.min_score.unwrap_or(0.0), query.limit.unwrap_or(50))
        .await?;
    Ok(Json(records.into_iter().map(MatchResponse::from).collect()))
}

/// Volunteer applies to the project.
#[utoipa::path(
    post,
    path = "/projects/{id}/apply",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID")),
    request_body = ApplyRequest,
    responses(
        (status = 201, description = "Application created", body = ApplicationResponse),
        (status = 409, description = "Already applied or project closed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn apply<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<ApplicationResponse>), ApiError> {
    let application = EnrollmentService::new(state.db())
        .apply(&ctx, &id, request.message.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(application.into())))
}

/// Applications for a project.
#[utoipa::path(
    get,
    path = "/projects/{id}/applications",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Applications, oldest first", body = [ApplicationResponse]),
        (status = 403, description = "No authority over the project", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn list_applications<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<ApplicationResponse>>, ApiError> {
    let applications = EnrollmentService::new(state.db())
        .list_applications(&ctx, &id)
        .await?;
    Ok(Json(
        applications
            .into_iter()
            .map(ApplicationResponse::from)
            .collect(),
    ))
}

/// Decide a pending application. Acceptance enrolls the volunteer as an
/// active team member in the same transaction.
#[utoipa::path(
    put,
    path = "/applications/{id}",
    tag = "projects",
    params(("id" = String, Path, description = "Application ID")),
    request_body = DecideApplicationRequest,
    responses(
        (status = 200, description = "Decided", body = ApplicationResponse),
        (status = 403, description = "No authority over the project", body = ErrorResponse),
        (status = 409, description = "Already decided", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn decide_application<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<DecideApplicationRequest>,
) -> Result<Json<ApplicationResponse>, ApiError> {
    let to: ApplicationStatus = request
        .status
        .parse()
        .map_err(|e: String| ApiError::bad_request(e))?;
    let application = EnrollmentService::new(state.db())
        .decide(&ctx, &id, to)
        .await?;
    Ok(Json(application.into()))
}

/// The project's team.
#[utoipa::path(
    get,
    path = "/projects/{id}/team",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Team members", body = [TeamMemberResponse]),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn list_team<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<TeamMemberResponse>>, ApiError> {
    let members = EnrollmentService::new(state.db()).list_team(&ctx, &id).await?;
    Ok(Json(
        members.into_iter().map(TeamMemberResponse::from).collect(),
    ))
}

/// Hour aggregates for a project.
#[utoipa::path(
    get,
    path = "/projects/{id}/hours",
    tag = "projects",
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Aggregated hours", body = ProjectHoursResponse),
        (status = 403, description = "Not a team member", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn project_hours<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ProjectHoursResponse>, ApiError> {
    let project = state.db().projects().get(&id).await?;
    if !is_team_member(state.db(), &ctx, &project).await? {
        return Err(Error::denied("caller is not a member of the project team").into());
    }
    let total_hours = state.db().tasks().project_hours(&id).await?;
    let my_hours = match ctx.volunteer_id.as_deref() {
        Some(volunteer_id) => Some(
            state
                .db()
                .tasks()
                .volunteer_project_hours(volunteer_id, &id)
                .await?,
        ),
        None => None,
    };
    Ok(Json(ProjectHoursResponse {
        project_id: id,
        total_hours,
        my_hours,
    }))
}
