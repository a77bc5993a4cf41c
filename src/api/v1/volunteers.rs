//! Volunteer claim and match handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use super::ErrorResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::auth::{RequestContext, can_manage_claim_weight};
use crate::db::{ClaimInput, Database, MatchRecord, VolunteerClaim, WeightOverride};
use crate::error::Error;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClaimDto {
    pub skill_id: String,
    /// Weight in [0, 1]; defaults to 0.5 and is clamped on write.
    pub weight: Option<f64>,
    /// Proficiency in 1..=5; clamped on write.
    pub proficiency: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct ClaimResponse {
    pub skill_id: String,
    pub weight: f64,
    pub proficiency: i32,
    pub updated_at: String,
}

impl From<VolunteerClaim> for ClaimResponse {
    fn from(c: VolunteerClaim) -> Self {
        Self {
            skill_id: c.skill_id,
            weight: c.weight,
            proficiency: c.proficiency,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustWeightRequest {
    pub weight: f64,
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WeightOverrideResponse {
    pub id: String,
    pub skill_id: String,
    pub adjuster_user_id: String,
    pub previous_weight: f64,
    pub new_weight: f64,
    pub reason: Option<String>,
    pub created_at: String,
}

impl From<WeightOverride> for WeightOverrideResponse {
    fn from(o: WeightOverride) -> Self {
        Self {
            id: o.id,
            skill_id: o.skill_id,
            adjuster_user_id: o.adjuster_user_id,
            previous_weight: o.previous_weight,
            new_weight: o.new_weight,
            reason: o.reason,
            created_at: o.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MatchResponse {
    pub volunteer_id: String,
    pub project_id: String,
    pub score: f64,
    pub jaccard: f64,
    pub matched_skill_ids: Vec<String>,
    pub matched_skill_count: i32,
    pub computed_at: String,
}

impl From<MatchRecord> for MatchResponse {
    fn from(m: MatchRecord) -> Self {
        Self {
            volunteer_id: m.volunteer_id,
            project_id: m.project_id,
            score: m.score,
            jaccard: m.jaccard,
            matched_skill_ids: m.matched_skill_ids,
            matched_skill_count: m.matched_skill_count,
            computed_at: m.computed_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MatchQuery {
    /// Minimum score filter
    #[param(example = 0.6)]
    pub min_score: Option<f64>,
    /// Maximum number of records
    #[param(example = 20)]
    pub limit: Option<usize>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Active claims for the caller's own profile.
#[utoipa::path(
    get,
    path = "/volunteers/me/skills",
    tag = "volunteers",
    responses(
        (status = 200, description = "Active claims", body = [ClaimResponse]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn get_my_claims<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
) -> Result<Json<Vec<ClaimResponse>>, ApiError> {
    let volunteer_id = require_volunteer(&ctx)?;
    let claims = state
        .db()
        .volunteers()
        .get_active_claims(&volunteer_id)
        .await?;
    Ok(Json(claims.into_iter().map(ClaimResponse::from).collect()))
}

/// Replace the caller's claim set. Claims for omitted skills deactivate.
#[utoipa::path(
    put,
    path = "/volunteers/me/skills",
    tag = "volunteers",
    request_body = [ClaimDto],
    responses(
        (status = 200, description = "The active claim set after replacement", body = [ClaimResponse]),
        (status = 404, description = "Unknown skill id", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, claims))]
pub async fn put_my_claims<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Json(claims): Json<Vec<ClaimDto>>,
) -> Result<Json<Vec<ClaimResponse>>, ApiError> {
    let volunteer_id = require_volunteer(&ctx)?;

    // Every referenced skill must exist in the taxonomy.
    for claim in &claims {
        state.db().skills().get(&claim.skill_id).await?;
    }

    let inputs: Vec<ClaimInput> = claims
        .into_iter()
        .map(|c| ClaimInput {
            skill_id: c.skill_id,
            weight: c.weight,
            proficiency: c.proficiency,
        })
        .collect();
    state
        .db()
        .volunteers()
        .set_claims(&volunteer_id, &inputs)
        .await?;

    let active = state
        .db()
        .volunteers()
        .get_active_claims(&volunteer_id)
        .await?;
    Ok(Json(active.into_iter().map(ClaimResponse::from).collect()))
}

/// Adjust one claim weight on behalf of a volunteer, appending the audit
/// override. Allowed for the owning user, an admin, or the lead of a
/// project requiring the skill.
#[utoipa::path(
    post,
    path = "/volunteers/{id}/skills/{skill_id}/weight",
    tag = "volunteers",
    params(
        ("id" = String, Path, description = "Volunteer ID"),
        ("skill_id" = String, Path, description = "Skill ID")
    ),
    request_body = AdjustWeightRequest,
    responses(
        (status = 200, description = "The recorded override", body = WeightOverrideResponse),
        (status = 403, description = "No authority over this claim", body = ErrorResponse),
        (status = 404, description = "No such claim", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx, request))]
pub async fn adjust_claim_weight<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path((volunteer_id, skill_id)): Path<(String, String)>,
    Json(request): Json<AdjustWeightRequest>,
) -> Result<Json<WeightOverrideResponse>, ApiError> {
    let volunteer = state.db().volunteers().get(&volunteer_id).await?;
    if !can_manage_claim_weight(state.db(), &ctx, &volunteer, &skill_id).await? {
        return Err(Error::denied("no authority to adjust this claim weight").into());
    }
    let record = state
        .db()
        .volunteers()
        .adjust_weight(
            &volunteer_id,
            &skill_id,
            request.weight,
            &ctx.user_id,
            request.reason.as_deref(),
        )
        .await?;
    Ok(Json(record.into()))
}

/// Audit trail for one claim.
#[utoipa::path(
    get,
    path = "/volunteers/{id}/skills/{skill_id}/overrides",
    tag = "volunteers",
    params(
        ("id" = String, Path, description = "Volunteer ID"),
        ("skill_id" = String, Path, description = "Skill ID")
    ),
    responses(
        (status = 200, description = "Overrides, oldest first", body = [WeightOverrideResponse]),
        (status = 403, description = "No authority over this claim", body = ErrorResponse)
    )
)]
#[instrument(skip(state, ctx))]
pub async fn list_claim_overrides<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Path((volunteer_id, skill_id)): Path<(String, String)>,
) -> Result<Json<Vec<WeightOverrideResponse>>, ApiError> {
    let volunteer = state.db().volunteers().get(&volunteer_id).await?;
    if !can_manage_claim_weight(state.db(), &ctx, &volunteer, &skill_id).await? {
        return Err(Error::denied("no authority over this claim").into());
    }
    let overrides = state
        .db()
        .volunteers()
        .list_overrides(&volunteer_id, &skill_id)
        .await?;
    Ok(Json(
        overrides
            .into_iter()
            .map(WeightOverrideResponse::from)
            .collect(),
    ))
}

/// Match records for the caller's own profile, best first.
#[utoipa::path(
    get,
    path = "/volunteers/me/matches",
    tag = "volunteers",
    params(MatchQuery),
    responses(
        (status = 200, description = "Match records, descending score", body = [MatchResponse])
    )
)]
#[instrument(skip(state, ctx))]
pub async fn my_matches<D: Database + 'static>(
    State(state): State<AppState<D>>,
    ctx: RequestContext,
    Query(query): Query<MatchQuery>,
) -> Result<Json<Vec<MatchResponse>>, ApiError> {
    let volunteer_id = require_volunteer(&ctx)?;
    let records = state
        .db()
        .matches()
        .for_volunteer(
            &volunteer_id,
            query.min_score.unwrap_or(0.0),
            query.limit.unwrap_or(50),
        )
        .await?;
    Ok(Json(records.into_iter().map(MatchResponse::from).collect()))
}

fn require_volunteer(ctx: &RequestContext) -> Result<String, ApiError> {
    ctx.volunteer_id
        .clone()
        .ok_or_else(|| Error::denied("caller has no volunteer profile").into())
}
