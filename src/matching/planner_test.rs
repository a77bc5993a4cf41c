//! Planner integration tests: top-K selection, suppression, summaries.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::sqlite::test_support::{
    create_project, create_user, create_volunteer, setup_db,
};
use crate::db::utils::current_timestamp;
use crate::db::{
    Database, MatchRecord, Message, MessageType, ProjectStatus, SqliteDatabase,
};
use crate::matching::NotificationPlanner;

async fn seed_candidate(
    db: &SqliteDatabase,
    email: &str,
    project_id: &str,
    score: f64,
) -> (String, String) {
    let user = create_user(db, email).await;
    let volunteer = create_volunteer(db, &user.id).await;
    db.matches()
        .upsert(&MatchRecord {
            volunteer_id: volunteer.id.clone(),
            project_id: project_id.to_string(),
            score,
            jaccard: score / 2.0,
            matched_skill_ids: vec![],
            matched_skill_count: 0,
            computed_at: current_timestamp(),
        })
        .await
        .unwrap();
    (volunteer.id, user.id)
}

async fn project_messages(db: &SqliteDatabase, project_id: &str) -> Vec<Message> {
    db.messages()
        .list_page(project_id, None, 100, true)
        .await
        .unwrap()
}

fn count_of_type(messages: &[Message], message_type: MessageType) -> usize {
    messages
        .iter()
        .filter(|m| m.message_type == message_type)
        .count()
}

#[tokio::test(flavor = "multi_thread")]
async fn suppression_window_spans_batches() {
    let db = Arc::new(setup_db().await);
    let lead = create_user(&db, "lead@example.org").await;
    let project = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    let (volunteer_id, user_id) = seed_candidate(&db, "v@example.org", &project.id, 0.8).await;

    let planner = NotificationPlanner::new(Arc::clone(&db), AppConfig::for_tests());

    // Batch 1 notifies once.
    let b1 = planner.run().await.expect("batch 1");
    assert_eq!(b1.candidates_notified, 1);
    assert_eq!(b1.leads_notified, 1);
    let messages = project_messages(&db, &project.id).await;
    assert_eq!(count_of_type(&messages, MessageType::CandidateMatch), 1);
    assert_eq!(count_of_type(&messages, MessageType::TeamLeadSummary), 1);
    let candidate_message = messages
        .iter()
        .find(|m| m.message_type == MessageType::CandidateMatch)
        .unwrap();
    assert_eq!(candidate_message.recipient_user_id.as_deref(), Some(user_id.as_str()));
    assert!(candidate_message.body.contains("80%"));
    assert!(candidate_message.body.contains("Test Project"));

    // Batch 2 inside the window: suppressed.
    let b2 = planner.run().await.expect("batch 2");
    assert_eq!(b2.candidates_notified, 0);
    let messages = project_messages(&db, &project.id).await;
    assert_eq!(count_of_type(&messages, MessageType::CandidateMatch), 1);

    // Age the notification past the window; batch 3 re-emits.
    sqlx::query("UPDATE notification_record SET sent_at = ? WHERE volunteer_id = ?")
        .bind("2026-01-01 00:00:00")
        .bind(&volunteer_id)
        .execute(db.pool())
        .await
        .unwrap();
    let b3 = planner.run().await.expect("batch 3");
    assert_eq!(b3.candidates_notified, 1);
    let messages = project_messages(&db, &project.id).await;
    assert_eq!(count_of_type(&messages, MessageType::CandidateMatch), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn rerunning_the_same_batch_id_adds_no_notifications() {
    let db = Arc::new(setup_db().await);
    let lead = create_user(&db, "lead@example.org").await;
    let project = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    seed_candidate(&db, "v@example.org", &project.id, 0.8).await;

    let planner = NotificationPlanner::new(Arc::clone(&db), AppConfig::for_tests());
    planner.run_batch("batch-1").await.expect("first");
    planner.run_batch("batch-1").await.expect("replay");

    let records = db
        .notifications()
        .list_for_batch("batch-1")
        .await
        .expect("records");
    assert_eq!(records.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn top_k_zero_still_sends_an_empty_lead_summary() {
    let db = Arc::new(setup_db().await);
    let lead = create_user(&db, "lead@example.org").await;
    let project = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    seed_candidate(&db, "v@example.org", &project.id, 0.9).await;

    let mut config = AppConfig::for_tests();
    config.notify_top_k = 0;
    let summary = NotificationPlanner::new(Arc::clone(&db), config)
        .run()
        .await
        .expect("run");
    assert_eq!(summary.candidates_notified, 0);
    assert_eq!(summary.leads_notified, 1);

    let messages = project_messages(&db, &project.id).await;
    assert_eq!(count_of_type(&messages, MessageType::CandidateMatch), 0);
    let lead_summary = messages
        .iter()
        .find(|m| m.message_type == MessageType::TeamLeadSummary)
        .expect("summary present");
    assert!(lead_summary.body.contains("No new candidates"));
    assert_eq!(lead_summary.recipient_user_id.as_deref(), Some(lead.id.as_str()));
}

#[tokio::test(flavor = "multi_thread")]
async fn min_score_and_top_k_bound_the_candidate_set() {
    let db = Arc::new(setup_db().await);
    let lead = create_user(&db, "lead@example.org").await;
    let project = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    seed_candidate(&db, "a@example.org", &project.id, 0.95).await;
    seed_candidate(&db, "b@example.org", &project.id, 0.75).await;
    seed_candidate(&db, "c@example.org", &project.id, 0.40).await;

    let mut config = AppConfig::for_tests();
    config.notify_top_k = 1;
    let summary = NotificationPlanner::new(Arc::clone(&db), config)
        .run()
        .await
        .expect("run");
    // 0.40 is under MIN_SCORE; top-1 keeps only the 0.95 candidate.
    assert_eq!(summary.candidates_notified, 1);

    let messages = project_messages(&db, &project.id).await;
    let candidate = messages
        .iter()
        .find(|m| m.message_type == MessageType::CandidateMatch)
        .unwrap();
    assert!(candidate.body.contains("95%"));
}

#[tokio::test(flavor = "multi_thread")]
async fn projects_without_a_lead_are_skipped() {
    let db = Arc::new(setup_db().await);
    let creator = create_user(&db, "c@example.org").await;
    let project = create_project(&db, &creator.id, None, ProjectStatus::Recruiting).await;
    seed_candidate(&db, "v@example.org", &project.id, 0.9).await;

    let summary = NotificationPlanner::new(Arc::clone(&db), AppConfig::for_tests())
        .run()
        .await
        .expect("run");
    assert_eq!(summary.projects_considered, 0);
    assert_eq!(summary.candidates_notified, 0);
    assert!(project_messages(&db, &project.id).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn hidden_profiles_are_never_notified() {
    let db = Arc::new(setup_db().await);
    let lead = create_user(&db, "lead@example.org").await;
    let project = create_project(&db, &lead.id, Some(&lead.id), ProjectStatus::Recruiting).await;
    let (volunteer_id, _) = seed_candidate(&db, "v@example.org", &project.id, 0.9).await;
    sqlx::query("UPDATE volunteer SET skills_visible = 0 WHERE id = ?")
        .bind(&volunteer_id)
        .execute(db.pool())
        .await
        .unwrap();

    let summary = NotificationPlanner::new(Arc::clone(&db), AppConfig::for_tests())
        .run()
        .await
        .expect("run");
    assert_eq!(summary.candidates_notified, 0);

    let messages = project_messages(&db, &project.id).await;
    assert_eq!(count_of_type(&messages, MessageType::CandidateMatch), 0);
    assert_eq!(count_of_type(&messages, MessageType::TeamLeadSummary), 1);
}
