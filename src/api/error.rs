//! API error responses.
//!
//! Every interactive failure renders as a short machine-readable kind
//! plus a human-readable message; store internals never leak.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::Error;

/// Wire shape of an error.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error kind
    #[schema(example = "authorization-denied")]
    pub kind: String,
    /// Human-readable message
    #[schema(example = "only the project lead can create tasks")]
    pub error: String,
}

/// A handler failure carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    /// Missing or invalid bearer credential.
    pub fn unauthenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "authorization-denied",
            message: "missing or invalid credential".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid-input",
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Error::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
            Error::StateViolation { .. } => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::FatalConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<crate::db::DbError> for ApiError {
    fn from(e: crate::db::DbError) -> Self {
        ApiError::from(Error::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                kind: self.kind.to_string(),
                error: self.message,
            }),
        )
            .into_response()
    }
}
