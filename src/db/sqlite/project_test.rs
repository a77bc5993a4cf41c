//! Tests for SqliteProjectRepository: requirements, applications,
//! transactional enrollment.

use super::test_support::{create_skill, create_user, create_volunteer, setup_db};
use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{
    Application, ApplicationStatus, Database, DbError, MemberStatus, ProjectStatus,
};

async fn make_project(
    db: &crate::db::SqliteDatabase,
    status: ProjectStatus,
) -> crate::db::Project {
    let creator = create_user(db, &format!("{}@example.org", generate_entity_id())).await;
    super::test_support::create_project(db, &creator.id, None, status).await
}

fn make_application(project_id: &str, volunteer_id: &str) -> Application {
    Application {
        id: generate_entity_id(),
        project_id: project_id.to_string(),
        volunteer_id: volunteer_id.to_string(),
        status: ApplicationStatus::Pending,
        message: None,
        created_at: current_timestamp(),
        decided_at: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn requirements_replacement_is_total() {
    let db = setup_db().await;
    let project = make_project(&db, ProjectStatus::Recruiting).await;
    let s1 = create_skill(&db, "Marketing").await;
    let s2 = create_skill(&db, "Writing").await;
    let s3 = create_skill(&db, "Design").await;

    db.projects()
        .set_requirements(&project.id, &[s1.id.clone(), s2.id.clone()])
        .await
        .expect("first set");
    db.projects()
        .set_requirements(&project.id, &[s3.id.clone()])
        .await
        .expect("second set");

    let current = db
        .projects()
        .get_requirements(&project.id)
        .await
        .expect("get");
    assert_eq!(current, vec![s3.id]);
}

#[tokio::test(flavor = "multi_thread")]
async fn matchable_projects_need_status_and_requirements() {
    let db = setup_db().await;
    let recruiting = make_project(&db, ProjectStatus::Recruiting).await;
    let draft = make_project(&db, ProjectStatus::Draft).await;
    let bare = make_project(&db, ProjectStatus::Active).await;
    let s1 = create_skill(&db, "Marketing").await;

    db.projects()
        .set_requirements(&recruiting.id, &[s1.id.clone()])
        .await
        .expect("set");
    db.projects()
        .set_requirements(&draft.id, &[s1.id.clone()])
        .await
        .expect("set");
    // `bare` gets no requirements.
    let _ = bare;

    let matchable = db.projects().list_matchable().await.expect("matchable");
    let ids: Vec<&str> = matchable.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![recruiting.id.as_str()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_live_application_conflicts() {
    let db = setup_db().await;
    let project = make_project(&db, ProjectStatus::Recruiting).await;
    let user = create_user(&db, "v@example.org").await;
    let volunteer = create_volunteer(&db, &user.id).await;

    db.projects()
        .create_application(&make_application(&project.id, &volunteer.id))
        .await
        .expect("first application");
    let err = db
        .projects()
        .create_application(&make_application(&project.id, &volunteer.id))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Constraint { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn acceptance_enrolls_in_same_transaction() {
    let db = setup_db().await;
    let project = make_project(&db, ProjectStatus::Recruiting).await;
    let user = create_user(&db, "v@example.org").await;
    let volunteer = create_volunteer(&db, &user.id).await;

    let application = make_application(&project.id, &volunteer.id);
    db.projects()
        .create_application(&application)
        .await
        .expect("apply");

    let transitioned = db
        .projects()
        .decide_application(&application.id, ApplicationStatus::Accepted)
        .await
        .expect("decide");
    assert!(transitioned);

    let member = db
        .projects()
        .get_team_member(&project.id, &volunteer.id)
        .await
        .expect("member lookup")
        .expect("enrolled");
    assert_eq!(member.status, MemberStatus::Active);

    let decided = db
        .projects()
        .get_application(&application.id)
        .await
        .expect("application");
    assert_eq!(decided.status, ApplicationStatus::Accepted);
    assert!(decided.decided_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn decide_is_single_shot() {
    let db = setup_db().await;
    let project = make_project(&db, ProjectStatus::Recruiting).await;
    let user = create_user(&db, "v@example.org").await;
    let volunteer = create_volunteer(&db, &user.id).await;

    let application = make_application(&project.id, &volunteer.id);
    db.projects()
        .create_application(&application)
        .await
        .expect("apply");

    assert!(
        db.projects()
            .decide_application(&application.id, ApplicationStatus::Rejected)
            .await
            .expect("first decision")
    );
    // Already decided: conditional update misses.
    assert!(
        !db.projects()
            .decide_application(&application.id, ApplicationStatus::Accepted)
            .await
            .expect("second decision")
    );

    let member = db
        .projects()
        .get_team_member(&project.id, &volunteer.id)
        .await
        .expect("member lookup");
    assert!(member.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn leads_project_requiring_follows_lead_and_skill() {
    let db = setup_db().await;
    let lead = create_user(&db, "lead@example.org").await;
    let other = create_user(&db, "other@example.org").await;
    let project =
        super::test_support::create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Active)
            .await;
    let s1 = create_skill(&db, "Marketing").await;
    let s2 = create_skill(&db, "Writing").await;
    db.projects()
        .set_requirements(&project.id, &[s1.id.clone()])
        .await
        .expect("set");

    assert!(
        db.projects()
            .leads_project_requiring(&lead.id, &s1.id)
            .await
            .expect("check")
    );
    assert!(
        !db.projects()
            .leads_project_requiring(&lead.id, &s2.id)
            .await
            .expect("check")
    );
    assert!(
        !db.projects()
            .leads_project_requiring(&other.id, &s1.id)
            .await
            .expect("check")
    );
}
