//! Shared fixtures for router tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::routes::create_router;
use super::state::AppState;
use crate::config::AppConfig;
use crate::db::SqliteDatabase;
use crate::db::sqlite::test_support::grant_role;

/// Router plus the backing in-memory database for direct seeding.
pub(crate) async fn test_app() -> (Router, Arc<SqliteDatabase>) {
    let db = Arc::new(crate::db::sqlite::test_support::setup_db().await);
    let state = AppState::new(Arc::clone(&db), AppConfig::for_tests());
    (create_router(state, false), db)
}

pub(crate) async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

pub(crate) async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

/// A registered, logged-in principal.
pub(crate) struct TestUser {
    pub token: String,
    pub user_id: String,
    pub volunteer_id: String,
}

/// Register through the API, grant extra roles directly, then log in so
/// the token carries the full role list.
pub(crate) async fn signup(
    app: &Router,
    db: &SqliteDatabase,
    email: &str,
    extra_roles: &[&str],
) -> TestUser {
    let response = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let registered = json_body(response).await;
    let user_id = registered["user_id"].as_str().unwrap().to_string();
    let volunteer_id = registered["volunteer_id"].as_str().unwrap().to_string();

    for role in extra_roles {
        grant_role(db, &user_id, role).await;
    }

    let response = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = json_body(response).await;

    TestUser {
        token: session["token"].as_str().unwrap().to_string(),
        user_id,
        volunteer_id,
    }
}
