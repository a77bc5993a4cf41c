//! API route configuration.

use axum::Router;
use axum::routing::{delete, get, patch, post, put};
use serde::Serialize;
use tracing::instrument;
use utoipa::{OpenApi, ToSchema};
use utoipa_scalar::{Scalar, Servable};

use super::state::AppState;
use super::v1;
use crate::db::Database;

/// Build routes with a generic database type.
///
/// Applies the turbofish for handlers generic over the Database trait.
macro_rules! routes {
    ($D:ty => {
        $($method:ident $path:literal => $($handler:ident)::+),* $(,)?
    }) => {{
        let router = Router::new();
        $(
            let router = router.route($path, $method($($handler)::+::<$D>));
        )*
        router
    }};
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    #[schema(example = "ok")]
    pub status: String,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Health check successful", body = HealthResponse))
)]
#[instrument]
pub async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CivicWeave API",
        version = "0.3.0",
        description = "Volunteer-to-project matching, team tasks, and messaging",
        license(name = "GPL-2.0")
    ),
    paths(
        health,
        v1::register,
        v1::login,
        v1::me,
        v1::list_taxonomy,
        v1::upsert_skill,
        v1::get_my_claims,
        v1::put_my_claims,
        v1::adjust_claim_weight,
        v1::list_claim_overrides,
        v1::my_matches,
        v1::create_project,
        v1::list_projects,
        v1::get_project,
        v1::patch_project,
        v1::put_requirements,
        v1::get_requirements,
        v1::project_matches,
        v1::apply,
        v1::list_applications,
        v1::decide_application,
        v1::list_team,
        v1::project_hours,
        v1::create_task,
        v1::list_tasks,
        v1::get_task,
        v1::update_task,
        v1::assign_task,
        v1::self_assign_task,
        v1::start_task,
        v1::complete_task,
        v1::block_task,
        v1::request_takeover,
        v1::reassign_task,
        v1::log_time,
        v1::list_time_logs,
        v1::add_comment,
        v1::list_comments,
        v1::list_activity,
        v1::send_message,
        v1::list_messages,
        v1::mark_read,
        v1::mark_all_read,
        v1::edit_message,
        v1::delete_message,
        v1::unread_counts,
    ),
    components(
        schemas(
            HealthResponse,
            v1::ErrorResponse,
            v1::RegisterRequest,
            v1::RegisterResponse,
            v1::LoginRequest,
            v1::LoginResponse,
            v1::MeResponse,
            v1::SkillResponse,
            v1::UpsertSkillRequest,
            v1::ClaimDto,
            v1::ClaimResponse,
            v1::AdjustWeightRequest,
            v1::WeightOverrideResponse,
            v1::MatchResponse,
            v1::ProjectResponse,
            v1::CreateProjectRequest,
            v1::PatchProjectRequest,
            v1::ApplyRequest,
            v1::ApplicationResponse,
            v1::DecideApplicationRequest,
            v1::TeamMemberResponse,
            v1::ProjectHoursResponse,
            v1::TaskResponse,
            v1::CreateTaskRequest,
            v1::UpdateTaskRequest,
            v1::AssignTaskRequest,
            v1::TransitionRequest,
            v1::LogTimeRequest,
            v1::TimeLogResponse,
            v1::TaskHoursResponse,
            v1::CommentRequest,
            v1::CommentResponse,
            v1::ActivityResponse,
            v1::MessageResponse,
            v1::SendMessageRequest,
            v1::EditMessageRequest,
            v1::UnreadCountsResponse,
        )
    ),
    tags(
        (name = "system", description = "Health and status"),
        (name = "auth", description = "Registration and sessions"),
        (name = "skills", description = "Skill taxonomy"),
        (name = "volunteers", description = "Volunteer claims and matches"),
        (name = "projects", description = "Projects, requirements, applications, teams"),
        (name = "tasks", description = "Task lifecycle, time logs, comments"),
        (name = "messages", description = "Project message log and read receipts")
    )
)]
pub struct ApiDoc;

/// Create the API router.
pub fn create_router<D: Database + 'static>(state: AppState<D>, enable_docs: bool) -> Router {
    let system_routes = Router::new().route("/health", get(health));

    let v1_routes = routes!(D => {
        // Auth
        post "/auth/register" => v1::register,
        post "/auth/login" => v1::login,
        get "/auth/me" => v1::me,
        // Skills
        get "/skills/taxonomy" => v1::list_taxonomy,
        post "/skills/taxonomy" => v1::upsert_skill,
        // Volunteers
        get "/volunteers/me/skills" => v1::get_my_claims,
        put "/volunteers/me/skills" => v1::put_my_claims,
        get "/volunteers/me/matches" => v1::my_matches,
        post "/volunteers/{id}/skills/{skill_id}/weight" => v1::adjust_claim_weight,
        get "/volunteers/{id}/skills/{skill_id}/overrides" => v1::list_claim_overrides,
        // Projects
        post "/projects" => v1::create_project,
        get "/projects" => v1::list_projects,
        get "/projects/{id}" => v1::get_project,
        patch "/projects/{id}" => v1::patch_project,
        put "/projects/{id}/skills" => v1::put_requirements,
        get "/projects/{id}/skills" => v1::get_requirements,
        get "/projects/{id}/matches" => v1::project_matches,
        post "/projects/{id}/apply" => v1::apply,
        get "/projects/{id}/applications" => v1::list_applications,
        put "/applications/{id}" => v1::decide_application,
        get "/projects/{id}/team" => v1::list_team,
        get "/projects/{id}/hours" => v1::project_hours,
        // Tasks
        post "/projects/{id}/tasks" => v1::create_task,
        get "/projects/{id}/tasks" => v1::list_tasks,
        get "/tasks/{id}" => v1::get_task,
        patch "/tasks/{id}" => v1::update_task,
        post "/tasks/{id}/assign" => v1::assign_task,
        post "/tasks/{id}/self-assign" => v1::self_assign_task,
        post "/tasks/{id}/start" => v1::start_task,
        post "/tasks/{id}/done" => v1::complete_task,
        post "/tasks/{id}/blocked" => v1::block_task,
        post "/tasks/{id}/takeover" => v1::request_takeover,
        post "/tasks/{id}/reassign" => v1::reassign_task,
        post "/tasks/{id}/time-logs" => v1::log_time,
        get "/tasks/{id}/time-logs" => v1::list_time_logs,
        post "/tasks/{id}/comments" => v1::add_comment,
        get "/tasks/{id}/comments" => v1::list_comments,
        get "/tasks/{id}/activity" => v1::list_activity,
        // Messages
        post "/projects/{id}/messages" => v1::send_message,
        get "/projects/{id}/messages" => v1::list_messages,
        post "/projects/{id}/messages/read-all" => v1::mark_all_read,
        post "/messages/{id}/read" => v1::mark_read,
        patch "/messages/{id}" => v1::edit_message,
        delete "/messages/{id}" => v1::delete_message,
        get "/messages/unread-counts" => v1::unread_counts,
    });

    let mut router = system_routes.merge(v1_routes);

    if enable_docs {
        let api = ApiDoc::openapi();
        router = router.merge(Scalar::with_url("/docs", api));
    }

    router.with_state(state)
}
