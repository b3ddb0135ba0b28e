//! Backup lifecycle, download, restore and retention over the API.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use agencia_check_admin::models::{BackupRequest, NotificationFilter};
use agencia_check_core::{BackupKind, BackupStatus};
use agencia_check_integration_tests::{ADMIN_EMAIL, MANAGER_EMAIL, TestContext};

async fn completed_backup(ctx: &TestContext, cookie: &str, body: Option<Value>) -> Value {
    let (status, _, created) = ctx
        .request(Method::POST, "/api/backups", Some(cookie), body)
        .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    assert_eq!(created["data"]["status"], "pending");
    let id = created["data"]["id"].as_str().unwrap().to_string();

    ctx.state.tasks().wait_idle().await;

    let (status, _, shown) = ctx
        .request(Method::GET, &format!("/api/backups/{id}"), Some(cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    shown["data"].clone()
}

#[tokio::test]
async fn test_backup_completes_and_notifies() {
    let ctx = TestContext::with_demo_data().await;
    let cookie = ctx.login(MANAGER_EMAIL).await;

    let item = completed_backup(&ctx, &cookie, None).await;
    assert_eq!(item["status"], "completed");
    assert_eq!(item["progress"], 100);
    assert_eq!(item["kind"], "full");
    assert!(item["download_url"].as_str().is_some());
    assert_eq!(item["checksum"].as_str().unwrap().len(), 64);

    let notifications = ctx
        .state
        .notifications()
        .list(&NotificationFilter::default())
        .await;
    assert_eq!(notifications[0].title, "Backup concluído");
    assert!(notifications[0].message.contains(item["name"].as_str().unwrap()));
}

#[tokio::test]
async fn test_download_serves_backup_file() {
    let ctx = TestContext::with_demo_data().await;
    let cookie = ctx.login(MANAGER_EMAIL).await;
    let item = completed_backup(&ctx, &cookie, Some(json!({ "kind": "sales" }))).await;
    let id = item["id"].as_str().unwrap();

    let request = Request::builder()
        .uri(format!("/api/backups/{id}/download"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = ctx.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        disposition,
        "attachment; filename=\"backup-sales-20240601-150000.json\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let file: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(file["version"], "1.0");
    assert_eq!(file["kind"], "sales");
    assert!(file["data"]["sales"].is_array());
    assert!(file["data"].get("inventory").is_none());
}

#[tokio::test]
async fn test_restore_brings_back_deleted_sales() {
    let ctx = TestContext::with_demo_data().await;
    let admin = ctx.actor(ADMIN_EMAIL).await;
    let cookie = ctx.login(ADMIN_EMAIL).await;
    let before = ctx.state.data().list_sales(&admin).await.unwrap();

    let item = completed_backup(&ctx, &cookie, None).await;
    let id = item["id"].as_str().unwrap();

    for sale in &before {
        ctx.state.data().delete_sale(&admin, sale.id).await.unwrap();
    }
    assert!(ctx.state.data().list_sales(&admin).await.unwrap().is_empty());

    let (status, _, body) = ctx
        .request(
            Method::POST,
            &format!("/api/backups/{id}/restore"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["restored"]["sales"], before.len());
    assert_eq!(body["data"]["restored"]["users"], Value::Null);
    assert_eq!(ctx.state.data().list_sales(&admin).await.unwrap(), before);
}

#[tokio::test]
async fn test_users_backup_cannot_be_restored() {
    let ctx = TestContext::new().await;
    let admin = ctx.actor(ADMIN_EMAIL).await;
    let backups = ctx.state.backups();

    let item = backups
        .create_backup(
            &admin,
            BackupRequest {
                kind: BackupKind::Users,
                name: None,
            },
        )
        .await
        .unwrap();
    ctx.state.tasks().wait_idle().await;
    assert_eq!(
        backups.get(&admin, item.id).await.unwrap().status,
        BackupStatus::Completed
    );

    let cookie = ctx.login(ADMIN_EMAIL).await;
    let (status, _, body) = ctx
        .request(
            Method::POST,
            &format!("/api/backups/{}/restore", item.id),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_uploaded_garbage_is_rejected() {
    let ctx = TestContext::with_demo_data().await;
    let admin = ctx.actor(ADMIN_EMAIL).await;
    let before = ctx.state.data().snapshot().await;
    let cookie = ctx.login(ADMIN_EMAIL).await;

    let (status, _, body) = ctx
        .request(
            Method::POST,
            "/api/backups/restore",
            Some(&cookie),
            Some(json!({ "hello": "world" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("inválido"));
    assert_eq!(ctx.state.data().snapshot().await, before);
    assert!(!ctx.state.data().list_sales(&admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_backup_is_gone() {
    let ctx = TestContext::new().await;
    let cookie = ctx.login(MANAGER_EMAIL).await;
    let item = completed_backup(&ctx, &cookie, None).await;
    let id = item["id"].as_str().unwrap();
    let url = item["download_url"].as_str().unwrap().to_string();

    let (status, _, _) = ctx
        .request(Method::DELETE, &format!("/api/backups/{id}"), Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!ctx.state.artifacts().contains(&url).await);

    let (status, _, _) = ctx
        .request(
            Method::GET,
            &format!("/api/backups/{id}/download"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cleanup_respects_retention() {
    let ctx = TestContext::new().await;
    let cookie = ctx.login(MANAGER_EMAIL).await;
    completed_backup(&ctx, &cookie, None).await;

    ctx.clock.advance(chrono::Duration::days(10));
    completed_backup(&ctx, &cookie, None).await;

    let (status, _, body) = ctx
        .request(
            Method::POST,
            "/api/backups/cleanup?retention_days=0",
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _, body) = ctx
        .request(
            Method::POST,
            "/api/backups/cleanup?retention_days=5",
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], 1);

    let (_, _, body) = ctx
        .request(Method::GET, "/api/backups", Some(&cookie), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_schedule_crud_over_http() {
    let ctx = TestContext::new().await;
    let cookie = ctx.login(MANAGER_EMAIL).await;

    let (status, _, body) = ctx
        .request(
            Method::POST,
            "/api/backups/configs",
            Some(&cookie),
            Some(json!({
                "name": "Diário",
                "frequency": "daily",
                "time": "02:00:00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let config = &body["data"];
    assert_eq!(config["enabled"], true);
    assert_eq!(config["retention_days"], 30);
    // 02:00 at -03:00 is 05:00 UTC the next day.
    assert_eq!(config["next_run"], "2024-06-02T05:00:00Z");
    let id = config["id"].as_str().unwrap().to_string();

    let (status, _, body) = ctx
        .request(
            Method::PATCH,
            &format!("/api/backups/configs/{id}"),
            Some(&cookie),
            Some(json!({ "enabled": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);

    let (status, _, _) = ctx
        .request(
            Method::DELETE,
            &format!("/api/backups/configs/{id}"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, body) = ctx
        .request(Method::GET, "/api/backups/configs", Some(&cookie), None)
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());
}
