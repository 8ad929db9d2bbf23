use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{TestApp, PASSWORD};

#[tokio::test]
async fn profile_requires_a_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/user/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/api/user/profile", Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_shows_role_and_permissions() {
    let app = TestApp::new();
    let (id, token) = app.seed_and_login("mod@example.com", "MODERATOR").await;

    let (status, body) = app.get("/api/user/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["role"], "MODERATOR");
    assert_eq!(body["permissions"].as_array().unwrap().len(), 8);
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn profile_update_changes_name_and_email() {
    let app = TestApp::new();
    app.seed_user("taken@example.com", "USER").await;
    let (_, token) = app.seed_and_login("me@example.com", "USER").await;

    let (status, body) = app
        .put(
            "/api/user/profile",
            Some(&token),
            json!({"name": "Renamed", "email": "Me2@Example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["email"], "me2@example.com");

    let (status, body) = app
        .put(
            "/api/user/profile",
            Some(&token),
            json!({"email": "taken@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email is already in use");
}

#[tokio::test]
async fn password_change_needs_the_current_password() {
    let app = TestApp::new();
    let (_, token) = app.seed_and_login("me@example.com", "USER").await;

    let (status, body) = app
        .put(
            "/api/user/profile",
            Some(&token),
            json!({"currentPassword": "Wrong1234", "newPassword": "Changed123"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Current password is incorrect");

    let (status, _) = app
        .put(
            "/api/user/profile",
            Some(&token),
            json!({"newPassword": "Changed123"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            "/api/user/profile",
            Some(&token),
            json!({"currentPassword": PASSWORD, "newPassword": "Changed123"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({"email": "me@example.com", "password": "Changed123"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn profile_update_authenticates_before_parsing() {
    let app = TestApp::new();

    let (status, body) = app
        .put("/api/user/profile", None, json!({"name": ["not", "a", "string"]}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = app
        .request(axum::http::Method::PUT, "/api/user/profile", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
