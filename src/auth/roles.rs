//! Project-scoped authorization predicates.
//!
//! All authority derives from role bindings plus these predicates; there
//! is no single-role field anywhere.

use crate::auth::RequestContext;
use crate::db::{Database, MemberStatus, Project, Volunteer};
use crate::error::Result;

/// True iff the principal leads the project or holds `admin`.
pub fn is_team_lead_of(ctx: &RequestContext, project: &Project) -> bool {
    ctx.is_admin() || project.lead_user_id.as_deref() == Some(ctx.user_id.as_str())
}

/// True iff the principal's volunteer profile has an active membership
/// row for the project, or the principal leads it, or holds `admin`.
pub async fn is_team_member<D: Database + ?Sized>(
    db: &D,
    ctx: &RequestContext,
    project: &Project,
) -> Result<bool> {
    if is_team_lead_of(ctx, project) {
        return Ok(true);
    }
    let Some(volunteer_id) = ctx.volunteer_id.as_deref() else {
        return Ok(false);
    };
    let member = db.projects().get_team_member(&project.id, volunteer_id).await?;
    Ok(matches!(
        member,
        Some(m) if m.status == MemberStatus::Active
    ))
}

/// True iff the principal may adjust the weight of the volunteer's claim
/// on the skill: admin, the owning user, or the lead of a project whose
/// requirements include the skill.
pub async fn can_manage_claim_weight<D: Database + ?Sized>(
    db: &D,
    ctx: &RequestContext,
    volunteer: &Volunteer,
    skill_id: &str,
) -> Result<bool> {
    if ctx.is_admin() || ctx.user_id == volunteer.user_id {
        return Ok(true);
    }
    Ok(db
        .projects()
        .leads_project_requiring(&ctx.user_id, skill_id)
        .await?)
}
