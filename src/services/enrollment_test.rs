//! Application and enrollment service tests.

use crate::db::sqlite::test_support::{
    create_project, create_user, create_volunteer, ctx, setup_db, volunteer_ctx,
};
use crate::db::{ApplicationStatus, Database, MemberStatus, ProjectStatus};
use crate::services::EnrollmentService;

#[tokio::test(flavor = "multi_thread")]
async fn apply_requires_a_volunteer_profile_and_open_project() {
    let db = setup_db().await;
    let lead = create_user(&db, "lead@example.org").await;
    let applicant = create_user(&db, "a@example.org").await;
    let volunteer = create_volunteer(&db, &applicant.id).await;
    let open = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    let draft = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Draft).await;
    let service = EnrollmentService::new(&db);

    // No volunteer profile on the context.
    let err = service
        .apply(&ctx(&applicant.id, &["volunteer"]), &open.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "authorization-denied");

    // Draft projects do not accept applications.
    let applicant_ctx = volunteer_ctx(&applicant.id, &volunteer.id, &["volunteer"]);
    let err = service.apply(&applicant_ctx, &draft.id, None).await.unwrap_err();
    assert_eq!(err.kind(), "state-violation");

    let application = service
        .apply(&applicant_ctx, &open.id, Some("count me in"))
        .await
        .expect("apply");
    assert_eq!(application.status, ApplicationStatus::Pending);
    assert_eq!(application.message.as_deref(), Some("count me in"));

    // Re-applying while a live application exists conflicts.
    let err = service.apply(&applicant_ctx, &open.id, None).await.unwrap_err();
    assert_eq!(err.kind(), "conflict");
}

#[tokio::test(flavor = "multi_thread")]
async fn acceptance_enrolls_and_is_single_shot() {
    let db = setup_db().await;
    let lead = create_user(&db, "lead@example.org").await;
    let applicant = create_user(&db, "a@example.org").await;
    let volunteer = create_volunteer(&db, &applicant.id).await;
    let project = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    let service = EnrollmentService::new(&db);

    let applicant_ctx = volunteer_ctx(&applicant.id, &volunteer.id, &["volunteer"]);
    let application = service
        .apply(&applicant_ctx, &project.id, None)
        .await
        .expect("apply");

    // A non-lead may not decide.
    let err = service
        .decide(&applicant_ctx, &application.id, ApplicationStatus::Accepted)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "authorization-denied");

    let lead_ctx = ctx(&lead.id, &["team_lead"]);
    let decided = service
        .decide(&lead_ctx, &application.id, ApplicationStatus::Accepted)
        .await
        .expect("accept");
    assert_eq!(decided.status, ApplicationStatus::Accepted);

    let member = db
        .projects()
        .get_team_member(&project.id, &volunteer.id)
        .await
        .expect("lookup")
        .expect("enrolled");
    assert_eq!(member.status, MemberStatus::Active);

    // Deciding again is a state violation.
    let err = service
        .decide(&lead_ctx, &application.id, ApplicationStatus::Rejected)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "state-violation");
}

#[tokio::test(flavor = "multi_thread")]
async fn only_accept_and_reject_are_valid_decisions() {
    let db = setup_db().await;
    let lead = create_user(&db, "lead@example.org").await;
    let applicant = create_user(&db, "a@example.org").await;
    let volunteer = create_volunteer(&db, &applicant.id).await;
    let project = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    let service = EnrollmentService::new(&db);

    let application = service
        .apply(
            &volunteer_ctx(&applicant.id, &volunteer.id, &["volunteer"]),
            &project.id,
            None,
        )
        .await
        .expect("apply");

    let err = service
        .decide(
            &ctx(&lead.id, &["team_lead"]),
            &application.id,
            ApplicationStatus::Pending,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-input");
}

#[tokio::test(flavor = "multi_thread")]
async fn rejection_does_not_enroll() {
    let db = setup_db().await;
    let lead = create_user(&db, "lead@example.org").await;
    let applicant = create_user(&db, "a@example.org").await;
    let volunteer = create_volunteer(&db, &applicant.id).await;
    let project = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    let service = EnrollmentService::new(&db);

    let application = service
        .apply(
            &volunteer_ctx(&applicant.id, &volunteer.id, &["volunteer"]),
            &project.id,
            None,
        )
        .await
        .expect("apply");
    service
        .decide(
            &ctx(&lead.id, &["team_lead"]),
            &application.id,
            ApplicationStatus::Rejected,
        )
        .await
        .expect("reject");

    assert!(
        db.projects()
            .get_team_member(&project.id, &volunteer.id)
            .await
            .expect("lookup")
            .is_none()
    );

    // The team listing is member-gated; the lead sees it.
    let team = service
        .list_team(&ctx(&lead.id, &["team_lead"]), &project.id)
        .await
        .expect("team");
    assert!(team.is_empty());
}
