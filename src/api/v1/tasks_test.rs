//! Task endpoint tests: lifecycle driven over HTTP.

use axum::http::StatusCode;
use axum::Router;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::api::test_support::{TestUser, json_body, send, signup, test_app};
use crate::db::SqliteDatabase;

/// Recruiting project led by a manager, one enrolled volunteer.
async fn project_with_member(
    app: &Router,
    db: &SqliteDatabase,
) -> (String, TestUser, TestUser) {
    let lead = signup(app, db, "lead@example.org", &["campaign_manager", "team_lead"]).await;
    let member = signup(app, db, "member@example.org", &[]).await;

    let response = send(
        app,
        "POST",
        "/projects",
        Some(&lead.token),
        Some(json!({ "title": "River Cleanup", "lead_user_id": lead.user_id })),
    )
    .await;
    let project = json_body(response).await;
    let project_id = project["id"].as_str().unwrap().to_string();
    send(
        app,
        "PATCH",
        &format!("/projects/{}", project_id),
        Some(&lead.token),
        Some(json!({ "status": "recruiting" })),
    )
    .await;

    let response = send(
        app,
        "POST",
        &format!("/projects/{}/apply", project_id),
        Some(&member.token),
        Some(json!({})),
    )
    .await;
    let application = json_body(response).await;
    send(
        app,
        "PUT",
        &format!("/applications/{}", application["id"].as_str().unwrap()),
        Some(&lead.token),
        Some(json!({ "status": "accepted" })),
    )
    .await;

    (project_id, lead, member)
}

async fn create_task(
    app: &Router,
    project_id: &str,
    lead: &TestUser,
    assignee: Option<&str>,
) -> Value {
    let response = send(
        app,
        "POST",
        &format!("/projects/{}/tasks", project_id),
        Some(&lead.token),
        Some(json!({
            "title": "Design flyers",
            "priority": "high",
            "assignee_volunteer_id": assignee,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_over_http() {
    let (app, db) = test_app().await;
    let db = Arc::clone(&db);
    let (project_id, lead, member) = project_with_member(&app, &db).await;
    let task = create_task(&app, &project_id, &lead, Some(&member.volunteer_id)).await;
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "high");

    // Member cannot create tasks.
    let response = send(
        &app,
        "POST",
        &format!("/projects/{}/tasks", project_id),
        Some(&member.token),
        Some(json!({ "title": "nope" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Assignee starts, blocks with a reason, resumes, completes.
    let response = send(
        &app,
        "POST",
        &format!("/tasks/{}/start", task_id),
        Some(&member.token),
        Some(json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let started = json_body(response).await;
    assert_eq!(started["status"], "in_progress");
    assert!(started["started_at"].is_string());

    let response = send(
        &app,
        "POST",
        &format!("/tasks/{}/blocked", task_id),
        Some(&member.token),
        Some(json!({ "note": "waiting on asset" })),
    )
    .await;
    let blocked = json_body(response).await;
    assert_eq!(blocked["status"], "blocked");
    assert_eq!(blocked["blocked_reason"], "waiting on asset");

    send(
        &app,
        "POST",
        &format!("/tasks/{}/start", task_id),
        Some(&member.token),
        Some(json!({})),
    )
    .await;
    let response = send(
        &app,
        "POST",
        &format!("/tasks/{}/done", task_id),
        Some(&member.token),
        Some(json!({ "note": "shipped" })),
    )
    .await;
    let done = json_body(response).await;
    assert_eq!(done["status"], "done");
    assert!(done["completed_at"].is_string());

    // The status messages landed in the project log.
    let response = send(
        &app,
        "GET",
        &format!("/projects/{}/messages", project_id),
        Some(&member.token),
        None,
    )
    .await;
    let messages = json_body(response).await;
    let types: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"task_blocked"));
    assert!(types.contains(&"task_done"));

    // Activity history is exposed.
    let response = send(
        &app,
        "GET",
        &format!("/tasks/{}/activity", task_id),
        Some(&member.token),
        None,
    )
    .await;
    let activity = json_body(response).await;
    assert_eq!(activity.as_array().unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_transition_maps_to_conflict() {
    let (app, db) = test_app().await;
    let (project_id, lead, member) = project_with_member(&app, &db).await;
    let task = create_task(&app, &project_id, &lead, Some(&member.volunteer_id)).await;

    let response = send(
        &app,
        "POST",
        &format!("/tasks/{}/done", task["id"].as_str().unwrap()),
        Some(&member.token),
        Some(json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "state-violation");
}

#[tokio::test(flavor = "multi_thread")]
async fn self_assign_only_when_unassigned() {
    let (app, db) = test_app().await;
    let (project_id, lead, member) = project_with_member(&app, &db).await;
    let task = create_task(&app, &project_id, &lead, None).await;
    let task_id = task["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "POST",
        &format!("/tasks/{}/self-assign", task_id),
        Some(&member.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let assigned = json_body(response).await;
    assert_eq!(
        assigned["assignee_volunteer_id"],
        member.volunteer_id.as_str()
    );

    // Second self-assign hits the already-assigned guard.
    let response = send(
        &app,
        "POST",
        &format!("/tasks/{}/self-assign", task_id),
        Some(&member.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread")]
async fn time_logs_aggregate_over_http() {
    let (app, db) = test_app().await;
    let (project_id, lead, member) = project_with_member(&app, &db).await;
    let task = create_task(&app, &project_id, &lead, Some(&member.volunteer_id)).await;
    let task_id = task["id"].as_str().unwrap().to_string();

    for hours in [2.5, 1.0, 0.75] {
        let response = send(
            &app,
            "POST",
            &format!("/tasks/{}/time-logs", task_id),
            Some(&member.token),
            Some(json!({ "hours": hours, "log_date": "2026-07-01" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // Non-positive hours are invalid input.
    let response = send(
        &app,
        "POST",
        &format!("/tasks/{}/time-logs", task_id),
        Some(&member.token),
        Some(json!({ "hours": 0, "log_date": "2026-07-01" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The lead is not the assignee and may not log.
    let response = send(
        &app,
        "POST",
        &format!("/tasks/{}/time-logs", task_id),
        Some(&lead.token),
        Some(json!({ "hours": 1, "log_date": "2026-07-01" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        "GET",
        &format!("/tasks/{}/time-logs", task_id),
        Some(&member.token),
        None,
    )
    .await;
    let hours = json_body(response).await;
    assert_eq!(hours["total_hours"], 4.25);
    assert_eq!(hours["logs"].as_array().unwrap().len(), 3);

    let response = send(
        &app,
        "GET",
        &format!("/projects/{}/hours", project_id),
        Some(&member.token),
        None,
    )
    .await;
    let project_hours = json_body(response).await;
    assert_eq!(project_hours["total_hours"], 4.25);
    assert_eq!(project_hours["my_hours"], 4.25);
}
