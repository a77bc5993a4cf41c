//! Domain error type.
//!
//! Every fallible operation in the matching, messaging, and task layers
//! returns one of these variants. The API layer maps variants onto HTTP
//! statuses; batch binaries map them onto exit codes.

use miette::Diagnostic;
use thiserror::Error;

use crate::db::DbError;

/// Domain operation errors.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Invalid input: {message}")]
    #[diagnostic(code(civicweave::invalid_input))]
    InvalidInput { message: String },

    #[error("Not authorized: {message}")]
    #[diagnostic(code(civicweave::authorization_denied))]
    AuthorizationDenied { message: String },

    #[error("Operation not permitted in current state: {message}")]
    #[diagnostic(code(civicweave::state_violation))]
    StateViolation { message: String },

    #[error("Not found: {entity_type} '{id}'")]
    #[diagnostic(code(civicweave::not_found))]
    NotFound { entity_type: String, id: String },

    #[error("Conflict: {message}")]
    #[diagnostic(code(civicweave::conflict))]
    Conflict { message: String },

    #[error("Store unavailable: {message}")]
    #[diagnostic(code(civicweave::unavailable))]
    Unavailable { message: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(civicweave::fatal_config))]
    FatalConfig { message: String },
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Error::AuthorizationDenied {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Error::StateViolation {
            message: message.into(),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict {
            message: message.into(),
        }
    }

    /// Short machine-readable kind, exposed to interactive callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput { .. } => "invalid-input",
            Error::AuthorizationDenied { .. } => "authorization-denied",
            Error::StateViolation { .. } => "state-violation",
            Error::NotFound { .. } => "not-found",
            Error::Conflict { .. } => "conflict",
            Error::Unavailable { .. } => "unavailable",
            Error::FatalConfig { .. } => "fatal-config",
        }
    }
}

impl From<DbError> for Error {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { entity_type, id } => Error::NotFound { entity_type, id },
            DbError::AlreadyExists { entity_type, id } => Error::Conflict {
                message: format!("{} '{}' already exists", entity_type, id),
            },
            DbError::Constraint { message } => Error::Conflict { message },
            DbError::InvalidData { message } => Error::InvalidInput { message },
            DbError::Validation { message } => Error::InvalidInput { message },
            DbError::Migration { message } => Error::FatalConfig { message },
            DbError::Database { message } | DbError::Connection { message } => {
                Error::Unavailable { message }
            }
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, Error>;
