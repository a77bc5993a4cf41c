//! Shared fixtures for repository, service, and batch tests.

use crate::auth::{RequestContext, hash_password};
use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{
    Database, Project, ProjectStatus, Skill, SqliteDatabase, User, Volunteer,
};

/// Fresh in-memory database with the full schema applied.
pub(crate) async fn setup_db() -> SqliteDatabase {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Migration should succeed");
    db
}

pub(crate) async fn create_user(db: &SqliteDatabase, email: &str) -> User {
    let user = User {
        id: generate_entity_id(),
        email: email.to_string(),
        password_digest: hash_password("password123"),
        verified: true,
        created_at: current_timestamp(),
    };
    db.users().create(&user).await.expect("Create user");
    user
}

pub(crate) async fn grant_role(db: &SqliteDatabase, user_id: &str, role_name: &str) {
    let role = db
        .users()
        .get_role_by_name(role_name)
        .await
        .expect("Role lookup")
        .expect("Role should be seeded");
    db.users()
        .assign_role(user_id, &role.id)
        .await
        .expect("Assign role");
}

pub(crate) async fn create_volunteer(db: &SqliteDatabase, user_id: &str) -> Volunteer {
    let volunteer = Volunteer {
        id: generate_entity_id(),
        user_id: user_id.to_string(),
        skills_visible: true,
        location: None,
        created_at: current_timestamp(),
    };
    db.volunteers()
        .create(&volunteer)
        .await
        .expect("Create volunteer");
    volunteer
}

pub(crate) async fn create_project(
    db: &SqliteDatabase,
    creator_user_id: &str,
    lead_user_id: Option<&str>,
    status: ProjectStatus,
) -> Project {
    let now = current_timestamp();
    let project = Project {
        id: generate_entity_id(),
        title: "Test Project".to_string(),
        description: None,
        status,
        lead_user_id: lead_user_id.map(str::to_string),
        creator_user_id: creator_user_id.to_string(),
        location: None,
        starts_on: None,
        ends_on: None,
        budget_total: None,
        budget_spent: None,
        created_at: now.clone(),
        updated_at: now,
    };
    db.projects().create(&project).await.expect("Create project");
    project
}

pub(crate) async fn create_skill(db: &SqliteDatabase, name: &str) -> Skill {
    db.skills().upsert(name, None).await.expect("Upsert skill")
}

/// Put the volunteer on the project team directly, bypassing the
/// application flow.
pub(crate) async fn enroll(db: &SqliteDatabase, project_id: &str, volunteer_id: &str) {
    sqlx::query(
        "INSERT INTO team_member (project_id, volunteer_id, status, joined_at)
         VALUES (?, ?, 'active', ?)
         ON CONFLICT(project_id, volunteer_id) DO UPDATE SET status = 'active', left_at = NULL",
    )
    .bind(project_id)
    .bind(volunteer_id)
    .bind(current_timestamp())
    .execute(db.pool())
    .await
    .expect("Enroll volunteer");
}

pub(crate) fn ctx(user_id: &str, roles: &[&str]) -> RequestContext {
    RequestContext::new(user_id, roles.iter().map(|r| r.to_string()).collect())
}

pub(crate) fn volunteer_ctx(user_id: &str, volunteer_id: &str, roles: &[&str]) -> RequestContext {
    ctx(user_id, roles).with_volunteer(volunteer_id)
}
