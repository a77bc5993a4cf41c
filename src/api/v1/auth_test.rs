//! Registration and login endpoint tests.

use axum::http::StatusCode;
use serde_json::json;

use crate::api::test_support::{json_body, send, signup, test_app};
use crate::auth::hash_password;
use crate::db::utils::{current_timestamp, generate_entity_id};
use crate::db::{Database, User};

#[tokio::test(flavor = "multi_thread")]
async fn register_creates_user_profile_and_default_role() {
    let (app, db) = test_app().await;
    let user = signup(&app, &db, "ada@example.org", &[]).await;

    let roles = db.users().roles_for_user(&user.user_id).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "volunteer");

    let volunteer = db
        .volunteers()
        .get(&user.volunteer_id)
        .await
        .expect("profile exists");
    assert!(volunteer.skills_visible);

    let response = send(&app, "GET", "/auth/me", Some(&user.token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = json_body(response).await;
    assert_eq!(me["user_id"], user.user_id.as_str());
    assert_eq!(me["volunteer_id"], user.volunteer_id.as_str());
    assert_eq!(me["roles"], json!(["volunteer"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn register_rejects_bad_input_and_duplicates() {
    let (app, db) = test_app().await;
    signup(&app, &db, "ada@example.org", &[]).await;

    let response = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": "not-an-email", "password": "password123" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": "ada@example.org", "password": "short" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Email uniqueness is case-insensitive via normalization.
    let response = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": "ADA@example.org", "password": "password123" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test(flavor = "multi_thread")]
async fn login_rejects_bad_credentials_uniformly() {
    let (app, db) = test_app().await;
    signup(&app, &db, "ada@example.org", &[]).await;

    for (email, password) in [
        ("ada@example.org", "wrong-password"),
        ("nobody@example.org", "password123"),
    ] {
        let response = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Not authorized: invalid credentials");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_role_principals_cannot_log_in() {
    let (app, db) = test_app().await;

    // A user created outside the registration flow, with no role rows.
    let user = User {
        id: generate_entity_id(),
        email: "norole@example.org".to_string(),
        password_digest: hash_password("password123"),
        verified: true,
        created_at: current_timestamp(),
    };
    db.users().create(&user).await.unwrap();

    let response = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "norole@example.org", "password": "password123" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("no roles"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stored_credentials_are_digest_only() {
    let (app, db) = test_app().await;
    let user = signup(&app, &db, "ada@example.org", &[]).await;

    let stored = db.users().get(&user.user_id).await.unwrap();
    assert!(!stored.password_digest.contains("password123"));
    assert!(stored.password_digest.starts_with("sha256$"));
}
