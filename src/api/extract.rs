//! Bearer-token extraction into a `RequestContext`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};

use super::error::ApiError;
use super::state::AppState;
use crate::auth::{RequestContext, verify_token};
use crate::db::Database;

/// Default per-request deadline for store work.
const REQUEST_DEADLINE_SECONDS: i64 = 30;

impl<D: Database + 'static> FromRequestParts<AppState<D>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<D>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(ApiError::unauthenticated)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(ApiError::unauthenticated)?;

        let claims = verify_token(&state.config().auth_secret, token)
            .map_err(|_| ApiError::unauthenticated())?;
        // A principal with zero roles never receives a token, but the
        // binding may have been revoked since issue.
        if claims.roles.is_empty() {
            return Err(ApiError::unauthenticated());
        }

        let mut ctx = RequestContext::new(claims.sub.clone(), claims.roles)
            .with_deadline(Utc::now() + Duration::seconds(REQUEST_DEADLINE_SECONDS));
        if let Some(volunteer_id) = state.volunteer_id_for(&claims.sub).await? {
            ctx = ctx.with_volunteer(volunteer_id);
        }
        Ok(ctx)
    }
}
