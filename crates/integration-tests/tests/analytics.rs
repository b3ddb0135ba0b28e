//! Dashboard figures and caching over the API.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use axum::http::{Method, StatusCode};

use agencia_check_admin::models::NewSale;
use agencia_check_admin::services::calculate_percent_change;
use agencia_check_core::{Money, PaymentMethod, SaleStatus};
use agencia_check_integration_tests::{
    ADMIN_EMAIL, SALES_EMAIL, TestContext, VIEWER_EMAIL,
};

fn paid_sale(cents: i64) -> NewSale {
    NewSale {
        value: Money::from_cents(cents),
        date: None,
        status: SaleStatus::Paid,
        reseller_id: None,
        customer: Some("Cliente".to_string()),
        product_id: None,
        quantity: None,
        payment_method: PaymentMethod::Pix,
    }
}

#[test]
fn test_percent_change_from_zero_baseline() {
    assert_eq!(calculate_percent_change(10.0, 0.0), 100.0);
    assert_eq!(calculate_percent_change(0.0, 0.0), 0.0);
}

#[tokio::test]
async fn test_viewer_sees_dashboard() {
    let ctx = TestContext::with_demo_data().await;
    let cookie = ctx.login(VIEWER_EMAIL).await;

    let (status, _, body) = ctx
        .request(Method::GET, "/api/analytics/dashboard", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["window"]["end"], "2024-06-01T15:00:00Z");
    assert!(data["sales_count"]["value"].as_f64().unwrap() >= 0.0);
    assert!(data["total_revenue"]["direction"].is_string());
}

#[tokio::test]
async fn test_sales_role_has_no_analytics() {
    let ctx = TestContext::with_demo_data().await;
    let cookie = ctx.login(SALES_EMAIL).await;

    let (status, _, body) = ctx
        .request(Method::GET, "/api/analytics/dashboard", Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains("analytics:view"));
}

#[tokio::test]
async fn test_inverted_window_is_rejected() {
    let ctx = TestContext::new().await;
    let cookie = ctx.login(ADMIN_EMAIL).await;

    let (status, _, _) = ctx
        .request(
            Method::GET,
            "/api/analytics/dashboard?start=2024-06-02T00:00:00Z&end=2024-06-01T00:00:00Z",
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_cached_until_invalidated() {
    let ctx = TestContext::new().await;
    let admin = ctx.actor(ADMIN_EMAIL).await;
    let cookie = ctx.login(ADMIN_EMAIL).await;
    let dashboard = "/api/analytics/dashboard";

    let (_, _, first) = ctx.request(Method::GET, dashboard, Some(&cookie), None).await;
    assert_eq!(first["data"]["sales_count"]["value"], 0.0);

    ctx.state
        .data()
        .create_sale(&admin, paid_sale(25_000))
        .await
        .unwrap();

    let (_, _, cached) = ctx.request(Method::GET, dashboard, Some(&cookie), None).await;
    assert_eq!(cached["data"], first["data"]);

    let (status, _, _) = ctx
        .request(
            Method::POST,
            "/api/analytics/cache/invalidate",
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, fresh) = ctx.request(Method::GET, dashboard, Some(&cookie), None).await;
    let data = &fresh["data"];
    assert_eq!(data["sales_count"]["value"], 1.0);
    assert_eq!(data["total_revenue"]["value"], 250.0);
    assert_eq!(data["total_revenue"]["percent_change"], 100.0);
    assert_eq!(data["total_revenue"]["direction"], "up");
}
