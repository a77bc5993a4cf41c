//! Skill taxonomy handlers.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use super::ErrorResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::auth::RequestContext;
use crate::db::{Database, ROLE_ADMIN, ROLE_CAMPAIGN_MANAGER, Skill};
use crate::error::Error;

#[derive(Serialize, ToSchema)]
pub struct SkillResponse {
    pub id: String,
    #[schema(example = "Event Planning")]
    pub name: String,
    pub category: Option<String>,
    pub created_at: String,
}

impl From<Skill> for SkillResponse {
    fn from(s: Skill) -> Self {
        Self {
            id: s.id,
            name: s.name,
            category: s.category,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertSkillRequest {
    #[schema(example = "Event Planning")]
    pub name: String,
    pub category: Option<String>,
}

/// List the global skill taxonomy.
#[utoipa::path(
    get,
    path = "/skills/taxonomy",
    tag = "skills",
    responses(
        (status = 200, description = "All skills ordered by id", body = [SkillResponse]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _ctx))]
pub async fn list_taxonomy<D: Database + 'static>(
    State(state): State<AppState<D>>,
    _ctx: RequestContext,
) -> Result<Json<Vec<SkillResponse>>, ApiError> {
    let skills = state.db().skills().list().await?;
    Ok(Json(skills.into_iter().map(SkillResponse::from).collect()))
}

/// Add a skill to the taxonomy (idempotent on the normalized name).
///
/// The taxonomy grows monotonically; there is no delete.
#[utoipa::path(
    post,
    path = "/skills/taxonomy",
    tag = "skills",
    request_body = UpsertSkillRequest,
    responses(
        (status = 200, description = "The (existing or fresh) skill row", body = SkillResponse),
        (status = 400, description = "Empty name", body = ErrorResponse),
        (status = 403, description = "Not a taxonomy manager", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn upsert_skill<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Json(request): Json<UpsertSkillRequest>,
) -> Result<Json<SkillResponse>, ApiError> {
    if !ctx.has_any_role(&[ROLE_ADMIN, ROLE_CAMPAIGN_MANAGER]) {
        return Err(Error::denied("only taxonomy managers can add skills").into());
    }
    let skill = state
        .db()
        .skills()
        .upsert(&request.name, request.category.as_deref())
        .await?;
    Ok(Json(skill.into()))
}
