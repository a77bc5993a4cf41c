//! Registration and login handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use super::ErrorResponse;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::auth::{RequestContext, hash_password, issue_token, verify_password};
use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{Database, User, Volunteer};
use crate::error::Error;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "ada@example.org")]
    pub email: String,
    pub password: String,
    pub location: Option<String>,
    /// Whether the profile is visible to candidate matching. Defaults to
    /// true.
    pub skills_visible: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user_id: String,
    pub volunteer_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.org")]
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub roles: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: String,
    pub volunteer_id: Option<String>,
    pub roles: Vec<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a user plus their volunteer profile and grant the default role.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn register<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("a valid email address is required"));
    }
    if request.password.len() < 8 {
        return Err(ApiError::bad_request(
            "password must be at least 8 characters",
        ));
    }

    let config = state.config().clone();
    let now = current_timestamp();
    let user = User {
        id: generate_entity_id(),
        email,
        password_digest: hash_password(&request.password),
        // The verification channel is external; without it every account
        // verifies at registration.
        verified: !config.session_require_verified_email,
        created_at: now.clone(),
    };
    state.db().users().create(&user).await?;

    let volunteer = Volunteer {
        id: generate_entity_id(),
        user_id: user.id.clone(),
        skills_visible: request.skills_visible.unwrap_or(true),
        location: request.location,
        created_at: now,
    };
    state.db().volunteers().create(&volunteer).await?;

    let role = state
        .db()
        .users()
        .get_role_by_name(&config.role_default_on_register)
        .await?
        .ok_or_else(|| {
            ApiError::from(Error::FatalConfig {
                message: format!(
                    "default role '{}' is not seeded",
                    config.role_default_on_register
                ),
            })
        })?;
    state.db().users().assign_role(&user.id, &role.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            volunteer_id: volunteer.id,
        }),
    ))
}

/// Exchange credentials for a bearer token carrying the roles list.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 403, description = "Invalid credentials or no roles", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn login<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // One uniform denial for unknown emails and bad passwords.
    let denied = || ApiError::from(Error::denied("invalid credentials"));

    let email = request.email.trim().to_lowercase();
    let user = state
        .db()
        .users()
        .get_by_email(&email)
        .await?
        .ok_or_else(denied)?;
    if !verify_password(&request.password, &user.password_digest) {
        return Err(denied());
    }
    if state.config().session_require_verified_email && !user.verified {
        return Err(Error::denied("email address is not verified").into());
    }

    let roles = state.db().users().roles_for_user(&user.id).await?;
    if roles.is_empty() {
        // A principal with zero roles cannot hold a session.
        return Err(Error::denied("account has no roles assigned").into());
    }
    let role_names: Vec<String> = roles.into_iter().map(|r| r.name).collect();

    let token = issue_token(&state.config().auth_secret, &user.id, &role_names);
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        roles: role_names,
    }))
}

/// Echo the authenticated principal.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current principal", body = MeResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn me<D: Database + 'static>(
    State(_state): State<AppState<D>>,
    ctx: RequestContext,
) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: ctx.user_id,
        volunteer_id: ctx.volunteer_id,
        roles: ctx.roles,
    })
}
