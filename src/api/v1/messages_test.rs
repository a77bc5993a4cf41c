//! Message endpoint tests: log, receipts, unread counts.

use axum::Router;
use axum::http::StatusCode;
use serde_json::json;

use crate::api::test_support::{TestUser, json_body, send, signup, test_app};
use crate::db::SqliteDatabase;

/// Recruiting project with an enrolled member, built over the API.
async fn project_with_member(app: &Router, db: &SqliteDatabase) -> (String, TestUser, TestUser) {
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

#[tokio::test(flavor = "multi_thread")]
async fn send_and_list_newest_first() {
    let (app, db) = test_app().await;
    let (project_id, lead, member) = project_with_member(&app, &db).await;
    let uri = format!("/projects/{}/messages", project_id);

    for body in ["first", "second"] {
        let response = send(
            &app,
            "POST",
            &uri,
            Some(&lead.token),
            Some(json!({ "body": body })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // Outsiders cannot post.
    let outsider = signup(&app, &db, "out@example.org", &[]).await;
    let response = send(
        &app,
        "POST",
        &uri,
        Some(&outsider.token),
        Some(json!({ "body": "hi" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Empty bodies are invalid.
    let response = send(
        &app,
        "POST",
        &uri,
        Some(&member.token),
        Some(json!({ "body": "  " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, "GET", &uri, Some(&member.token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let messages = json_body(response).await;
    let bodies: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["body"].as_str().unwrap())
        .collect();
    // Newest first; same-second sends tie-break by id descending, so
    // both orders of the pair are acceptable as long as both appear.
    assert_eq!(bodies.len(), 2);
    assert!(bodies.contains(&"first"));
    assert!(bodies.contains(&"second"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unread_counts_follow_reads() {
    let (app, db) = test_app().await;
    let (project_id, lead, member) = project_with_member(&app, &db).await;
    let uri = format!("/projects/{}/messages", project_id);

    let mut message_ids = Vec::new();
    for body in ["m1", "m2"] {
        let response = send(
            &app,
            "POST",
            &uri,
            Some(&lead.token),
            Some(json!({ "body": body })),
        )
        .await;
        message_ids.push(json_body(response).await["id"].as_str().unwrap().to_string());
    }
    // The member's own message never counts toward their unread total.
    send(
        &app,
        "POST",
        &uri,
        Some(&member.token),
        Some(json!({ "body": "mine" })),
    )
    .await;

    let counts_uri = "/messages/unread-counts";
    let response = send(&app, "GET", counts_uri, Some(&member.token), None).await;
    let counts = json_body(response).await;
    assert_eq!(counts["counts"][&project_id], 2);

    let response = send(
        &app,
        "POST",
        &format!("/messages/{}/read", message_ids[0]),
        Some(&member.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, "GET", counts_uri, Some(&member.token), None).await;
    let counts = json_body(response).await;
    assert_eq!(counts["counts"][&project_id], 1);

    let response = send(
        &app,
        "POST",
        &format!("/projects/{}/messages/read-all", project_id),
        Some(&member.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, "GET", counts_uri, Some(&member.token), None).await;
    let counts = json_body(response).await;
    assert!(counts["counts"].get(&project_id).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_and_delete_follow_the_rules() {
    let (app, db) = test_app().await;
    let (project_id, lead, member) = project_with_member(&app, &db).await;
    let uri = format!("/projects/{}/messages", project_id);

    let response = send(
        &app,
        "POST",
        &uri,
        Some(&member.token),
        Some(json!({ "body": "typo here" })),
    )
    .await;
    let message_id = json_body(response).await["id"].as_str().unwrap().to_string();

    // Fresh messages are editable by their author only.
    let response = send(
        &app,
        "PATCH",
        &format!("/messages/{}", message_id),
        Some(&lead.token),
        Some(json!({ "body": "hijacked" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        "PATCH",
        &format!("/messages/{}", message_id),
        Some(&member.token),
        Some(json!({ "body": "fixed" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let edited = json_body(response).await;
    assert_eq!(edited["body"], "fixed");
    assert!(edited["edited_at"].is_string());

    // Soft delete, then edits are refused.
    let response = send(
        &app,
        "DELETE",
        &format!("/messages/{}", message_id),
        Some(&member.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app,
        "PATCH",
        &format!("/messages/{}", message_id),
        Some(&member.token),
        Some(json!({ "body": "too late" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Deleted messages disappear from the default listing.
    let response = send(&app, "GET", &uri, Some(&member.token), None).await;
    let messages = json_body(response).await;
    assert!(messages.as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn polling_with_since_returns_only_newer_messages() {
    let (app, db) = test_app().await;
    let (project_id, lead, member) = project_with_member(&app, &db).await;
    let uri = format!("/projects/{}/messages", project_id);

    let response = send(
        &app,
        "POST",
        &uri,
        Some(&lead.token),
        Some(json!({ "body": "old" })),
    )
    .await;
    let old = json_body(response).await;
    let old_created_at = old["created_at"].as_str().unwrap();

    let response = send(
        &app,
        "GET",
        &format!("{}?since={}", uri, urlencode(old_created_at)),
        Some(&member.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let newer = json_body(response).await;
    // Strictly greater than the cursor: the old message is excluded.
    assert!(newer.as_array().unwrap().is_empty());
}

fn urlencode(s: &str) -> String {
    s.replace(' ', "%20").replace(':', "%3A")
}
