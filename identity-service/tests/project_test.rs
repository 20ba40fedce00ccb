mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, ADMIN_PROJECT};
use serde_json::json;

#[tokio::test]
async fn test_project_lifecycle() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/project",
            Some(&admin),
            Some(json!({ "name": "acme", "token_policy": {
                "access_token_lifespan": 60,
                "refresh_token_lifespan": 3600,
                "signing_algorithm": "HS256"
            } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token_policy"]["access_token_lifespan"], 60);

    let (status, body) = app
        .send(Method::GET, "/api/v1/project", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["acme", ADMIN_PROJECT]);

    // default roles were seeded
    let (_, roles) = app
        .send(Method::GET, "/api/v1/project/acme/role", Some(&admin), None)
        .await;
    assert_eq!(roles.as_array().unwrap().len(), 8);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/v1/project/acme",
            Some(&admin),
            Some(json!({ "token_policy": {
                "access_token_lifespan": 600,
                "refresh_token_lifespan": 60
            } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/project",
            Some(&admin),
            Some(json!({ "name": "acme" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_project_policy_drives_token_lifespans() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.send(
        Method::POST,
        "/api/v1/project",
        Some(&admin),
        Some(json!({ "name": "acme", "token_policy": {
            "access_token_lifespan": 60,
            "refresh_token_lifespan": 120
        } })),
    )
    .await;
    app.user_token(&admin, "acme", "alice", &[]).await;

    let pair = app.login("acme", "alice", "user-password").await;
    assert_eq!(pair["access_expires_in"], 60);
    assert_eq!(pair["refresh_expires_in"], 120);
}

#[tokio::test]
async fn test_invalid_project_name() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    for name in ["abc", "Acme", "1acme", "has space"] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/project",
                Some(&admin),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name} should be rejected");
    }
}

#[tokio::test]
async fn test_delete_cascades() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_project(&admin, "acme").await;
    app.send(
        Method::POST,
        "/api/v1/project/acme/client",
        Some(&admin),
        Some(json!({ "id": "cli1", "access_type": "public" })),
    )
    .await;

    let (status, _) = app
        .send(Method::DELETE, "/api/v1/project/acme", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(Method::GET, "/api/v1/project/acme/client/cli1", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // recreating starts from an empty project
    app.create_project(&admin, "acme").await;
    let (_, clients) = app
        .send(Method::GET, "/api/v1/project/acme/client", Some(&admin), None)
        .await;
    assert!(clients.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_project_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/project/{}", ADMIN_PROJECT),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn test_health_and_openapi() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "identity-service");

    let (status, body) = app
        .send(Method::GET, "/.well-known/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]
        .get("/api/v1/project/{project}/client/{id}")
        .is_some());
}
