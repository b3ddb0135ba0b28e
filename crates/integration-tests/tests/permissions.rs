//! Role gates on the services and the API.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;

use agencia_check_admin::models::{BackupRequest, NewUser};
use agencia_check_admin::services::ServiceError;
use agencia_check_core::{Permission, UserRole};
use agencia_check_integration_tests::{
    ADMIN_EMAIL, MANAGER_EMAIL, PASSWORD, SALES_EMAIL, TestContext, VIEWER_EMAIL,
};

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        name: "Nova Pessoa".to_string(),
        role: UserRole::Sales,
        password: PASSWORD.to_string(),
    }
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let ctx = TestContext::new().await;
    let admin = ctx.actor(ADMIN_EMAIL).await;

    let result = ctx
        .state
        .users()
        .create(&admin, new_user(&SALES_EMAIL.to_uppercase()))
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
    assert_eq!(ctx.state.users().count().await, 4);
}

#[tokio::test]
async fn test_non_admin_cannot_create_users() {
    let ctx = TestContext::new().await;
    let manager = ctx.actor(MANAGER_EMAIL).await;

    let result = ctx
        .state
        .users()
        .create(&manager, new_user("novo@agencia.com.br"))
        .await;
    assert!(matches!(result, Err(ServiceError::AdminOnly)));
    assert_eq!(ctx.state.users().count().await, 4);
}

// ============================================================================
// Gated collections stay unchanged
// ============================================================================

#[tokio::test]
async fn test_viewer_cannot_back_up() {
    let ctx = TestContext::new().await;
    let viewer = ctx.actor(VIEWER_EMAIL).await;
    let admin = ctx.actor(ADMIN_EMAIL).await;

    let result = ctx
        .state
        .backups()
        .create_backup(&viewer, BackupRequest::default())
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Forbidden(Permission::ManageBackups))
    ));
    assert!(ctx.state.backups().list(&admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sales_role_cannot_manage_inventory_over_http() {
    let ctx = TestContext::with_demo_data().await;
    let admin = ctx.actor(ADMIN_EMAIL).await;
    let before = ctx.state.data().list_inventory(&admin).await.unwrap();

    let cookie = ctx.login(SALES_EMAIL).await;
    let (status, _, body) = ctx
        .request(
            Method::POST,
            &format!("/api/inventory/{}/adjust", before[0].id),
            Some(&cookie),
            Some(json!({ "delta": -1 })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("inventory:manage"));
    assert_eq!(ctx.state.data().list_inventory(&admin).await.unwrap(), before);
}

#[tokio::test]
async fn test_viewer_reads_but_cannot_write_sales() {
    let ctx = TestContext::with_demo_data().await;
    let cookie = ctx.login(VIEWER_EMAIL).await;

    let (status, _, body) = ctx
        .request(Method::GET, "/api/sales", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let count = body["data"].as_array().unwrap().len();
    assert!(count > 0);

    let (status, _, _) = ctx
        .request(
            Method::POST,
            "/api/sales",
            Some(&cookie),
            Some(json!({ "value": "10.00", "payment_method": "pix" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, _, body) = ctx
        .request(Method::GET, "/api/sales", Some(&cookie), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), count);
}

#[tokio::test]
async fn test_manager_cannot_list_users() {
    let ctx = TestContext::new().await;
    let cookie = ctx.login(MANAGER_EMAIL).await;

    let (status, _, body) = ctx
        .request(Method::GET, "/api/users", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_role_change_applies_to_live_session() {
    let ctx = TestContext::new().await;
    let admin = ctx.actor(ADMIN_EMAIL).await;
    let cookie = ctx.login(VIEWER_EMAIL).await;

    let (status, _, _) = ctx
        .request(Method::GET, "/api/backups", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let viewer = ctx.actor(VIEWER_EMAIL).await;
    ctx.state
        .users()
        .update(
            &admin,
            viewer.id,
            agencia_check_admin::models::UserUpdate {
                role: Some(UserRole::Manager),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, _, _) = ctx
        .request(Method::GET, "/api/backups", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}
