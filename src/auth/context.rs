//! Per-request principal context.
//!
//! Replaces any notion of a mutable request "session": one immutable value
//! carrying the principal, their roles, and the request deadline, passed
//! explicitly to every protected operation.

use chrono::{DateTime, Utc};

use crate::db::ROLE_ADMIN;
use crate::error::{Error, Result};

/// The authenticated principal for one request or batch step.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
    /// The principal's volunteer profile, when one exists.
    pub volunteer_id: Option<String>,
    /// Role names bound to the principal. Never empty for an
    /// authenticated context: zero-role users cannot log in.
    pub roles: Vec<String>,
    /// Store calls observed past this instant are abandoned.
    pub deadline: Option<DateTime<Utc>>,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            volunteer_id: None,
            roles,
            deadline: None,
        }
    }

    pub fn with_volunteer(mut self, volunteer_id: impl Into<String>) -> Self {
        self.volunteer_id = Some(volunteer_id.into());
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn has_any_role(&self, names: &[&str]) -> bool {
        self.roles.iter().any(|r| names.contains(&r.as_str()))
    }

    pub fn is_admin(&self) -> bool {
        self.has_any_role(&[ROLE_ADMIN])
    }

    /// Fail with `unavailable` once the deadline has passed, so a slow
    /// chain of store calls stops instead of piling onto a saturated pool.
    pub fn ensure_live(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Utc::now() > deadline => Err(Error::Unavailable {
                message: "request deadline exceeded".to_string(),
            }),
            _ => Ok(()),
        }
    }
}
