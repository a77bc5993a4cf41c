//! Applications and team enrollment.
//!
//! Accepting an application enrolls the volunteer as an active team
//! member in the same store transaction, so membership-gated checks never
//! observe an accepted volunteer without a team row.

use crate::auth::{RequestContext, is_team_lead_of, is_team_member};
use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{Application, ApplicationStatus, Database, TeamMember};
use crate::error::{Error, Result};

/// Application/enrollment domain service.
pub struct EnrollmentService<'a, D> {
    db: &'a D,
}

impl<'a, D: Database> EnrollmentService<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self { db }
    }

    /// Volunteer applies to a project open for matching.
    pub async fn apply(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        message: Option<&str>,
    ) -> Result<Application> {
        ctx.ensure_live()?;
        let volunteer_id = ctx
            .volunteer_id
            .as_deref()
            .ok_or_else(|| Error::denied("caller has no volunteer profile"))?;
        let project = self.db.projects().get(project_id).await?;
        if !project.status.is_eligible_for_matching() {
            return Err(Error::state("project is not accepting applications"));
        }

        let application = Application {
            id: generate_entity_id(),
            project_id: project.id.clone(),
            volunteer_id: volunteer_id.to_string(),
            status: ApplicationStatus::Pending,
            message: message.map(str::to_string),
            created_at: current_timestamp(),
            decided_at: None,
        };
        self.db.projects().create_application(&application).await?;
        Ok(application)
    }

    /// Lead decision on a pending application. Acceptance auto-enrolls
    /// the volunteer.
    pub async fn decide(
        &self,
        ctx: &RequestContext,
        application_id: &str,
        to: ApplicationStatus,
    ) -> Result<Application> {
        ctx.ensure_live()?;
        if !matches!(to, ApplicationStatus::Accepted | ApplicationStatus::Rejected) {
            return Err(Error::invalid_input(
                "applications can only be accepted or rejected",
            ));
        }
        let application = self.db.projects().get_application(application_id).await?;
        let project = self.db.projects().get(&application.project_id).await?;
        if !is_team_lead_of(ctx, &project) {
            return Err(Error::denied(
                "only the project lead can decide applications",
            ));
        }
        if application.status != ApplicationStatus::Pending {
            return Err(Error::state("application has already been decided"));
        }

        let transitioned = self.db.projects().decide_application(application_id, to).await?;
        if !transitioned {
            // Lost a race with a concurrent decision.
            return Err(Error::conflict("application was decided concurrently"));
        }
        Ok(self.db.projects().get_application(application_id).await?)
    }

    pub async fn list_applications(
        &self,
        ctx: &RequestContext,
        project_id: &str,
    ) -> Result<Vec<Application>> {
        let project = self.db.projects().get(project_id).await?;
        if !is_team_lead_of(ctx, &project) {
            return Err(Error::denied(
                "only the project lead can list applications",
            ));
        }
        Ok(self.db.projects().list_applications(project_id).await?)
    }

    pub async fn list_team(
        &self,
        ctx: &RequestContext,
        project_id: &str,
    ) -> Result<Vec<TeamMember>> {
        let project = self.db.projects().get(project_id).await?;
        if !is_team_member(self.db, ctx, &project).await? {
            return Err(Error::denied("caller is not a member of the project team"));
        }
        Ok(self.db.projects().list_team(project_id).await?)
    }
}
