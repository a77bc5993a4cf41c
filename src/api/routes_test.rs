//! Router-level tests: health, authentication gate, error shape.

use axum::http::StatusCode;

use super::test_support::{json_body, send, signup, test_app};

#[tokio::test(flavor = "multi_thread")]
async fn health_is_public() {
    let (app, _db) = test_app().await;
    let response = send(&app, "GET", "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn protected_routes_require_a_bearer_token() {
    let (app, _db) = test_app().await;
    for uri in [
        "/skills/taxonomy",
        "/volunteers/me/skills",
        "/projects",
        "/messages/unread-counts",
    ] {
        let response = send(&app, "GET", uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let response = send(&app, "GET", "/projects", Some("not-a-token"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn errors_carry_kind_and_message() {
    let (app, db) = test_app().await;
    let user = signup(&app, &db, "a@example.org", &[]).await;

    let response = send(
        &app,
        "GET",
        "/projects/does-not-exist",
        Some(&user.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "not-found");
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}
