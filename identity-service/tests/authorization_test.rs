mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::TestApp;
use identity_service::models::{Action, Grant, GrantScope, GrantTarget, SigningAlgorithm};
use identity_service::services::{AccessClaims, TokenUse};
use serde_json::json;

#[tokio::test]
async fn test_missing_or_invalid_credential() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_project(&admin, "acme").await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/project/acme/client", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthenticated");

    let (status, _) = app
        .send(Method::GET, "/api/v1/project/acme/client", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_credential_is_unauthenticated_not_forbidden() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_project(&admin, "acme").await;

    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        sub: "admin".to_string(),
        project: "master".to_string(),
        grants: vec![Grant::new(GrantTarget::All, Action::Read, GrantScope::Global)],
        iss: "identity-test".to_string(),
        iat: now - 600,
        exp: now - 300,
        jti: "expired".to_string(),
        typ: TokenUse::Access,
    };
    let jwt = identity_service::services::JwtService::new(&common::test_config().jwt).unwrap();
    let token = jwt.sign(&claims, SigningAlgorithm::HS256).unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/v1/project/acme/client", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["details"], "credential expired");
}

#[tokio::test]
async fn test_tenant_scoped_grants() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_project(&admin, "acme").await;
    app.create_project(&admin, "globex").await;

    let reader = app
        .user_token(&admin, "acme", "reader", &["read-client"])
        .await;

    let (status, _) = app
        .send(Method::GET, "/api/v1/project/acme/client", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // read does not imply write
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/project/acme/client",
            Some(&reader),
            Some(json!({ "id": "cli1", "access_type": "public" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // grant is confined to its own project
    let (status, _) = app
        .send(Method::GET, "/api/v1/project/globex/client", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // and to its own resource kind
    let (status, _) = app
        .send(Method::GET, "/api/v1/project/acme/user", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_write_does_not_imply_read() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_project(&admin, "acme").await;

    let writer = app
        .user_token(&admin, "acme", "writer", &["write-client"])
        .await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/project/acme/client",
            Some(&writer),
            Some(json!({ "id": "cli1", "access_type": "public" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .send(Method::GET, "/api/v1/project/acme/client/cli1", Some(&writer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tenant_system_role_is_not_global() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_project(&admin, "acme").await;

    // write-project is a system role, but only the admin project's system
    // roles grant globally
    let owner = app
        .user_token(&admin, "acme", "owner", &["write-project", "read-project"])
        .await;

    let (status, _) = app
        .send(Method::GET, "/api/v1/project/acme", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::GET, "/api/v1/project", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, "/api/v1/project/acme", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_authorization_precedes_validation() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_project(&admin, "acme").await;

    // malformed body, no credential: the credential is reported
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/project/acme/client",
            None,
            Some(json!({ "id": 42 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
