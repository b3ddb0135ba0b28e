//! Integration tests for Agência Check.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p agencia-check-integration-tests
//! ```
//!
//! Every test builds its own in-memory back-office with a pinned clock, so
//! nothing needs to be running.
//!
//! # Test Categories
//!
//! - `permissions` - Role gates on the services and the API
//! - `notifications` - Delivery policy, quiet hours and read state
//! - `backups` - Backup lifecycle, restore, retention and schedules
//! - `analytics` - Dashboard figures and caching
//! - `api` - Session flow and response envelopes over the router

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use agencia_check_admin::clock::FixedClock;
use agencia_check_admin::config::{AdminCredential, BootstrapAdmin, ServiceSettings};
use agencia_check_admin::models::CurrentUser;
use agencia_check_admin::routes;
use agencia_check_admin::state::{AppState, StateParts};
use agencia_check_admin::storage::Storage;
use agencia_check_core::Email;

/// Password shared by the bootstrap admin and the demo users.
pub const PASSWORD: &str = "Vx9!kq2#Lm";

/// Bootstrap admin email.
pub const ADMIN_EMAIL: &str = "admin@agencia.com.br";
/// Demo manager email.
pub const MANAGER_EMAIL: &str = "gerente@agencia.com.br";
/// Demo sales email.
pub const SALES_EMAIL: &str = "vendas@agencia.com.br";
/// Demo viewer email.
pub const VIEWER_EMAIL: &str = "visualizador@agencia.com.br";

/// 2024-06-01 15:00 UTC, noon at the default -03:00 offset.
#[must_use]
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap()
}

/// Settings for tests: instant backup steps and no real-time feed.
#[must_use]
pub fn test_settings() -> ServiceSettings {
    ServiceSettings {
        backup_step_delay: Duration::ZERO,
        feed_enabled: false,
        ..ServiceSettings::default()
    }
}

/// An in-memory back-office with a pinned clock.
pub struct TestContext {
    pub state: AppState,
    pub clock: Arc<FixedClock>,
    pub router: Router,
}

impl TestContext {
    /// Back-office with the four demo users and empty collections.
    pub async fn new() -> Self {
        Self::with_settings(test_settings(), false).await
    }

    /// Back-office with the seeded demo collections.
    pub async fn with_demo_data() -> Self {
        Self::with_settings(test_settings(), true).await
    }

    /// Back-office with custom settings.
    pub async fn with_settings(settings: ServiceSettings, seed_demo_data: bool) -> Self {
        let clock = FixedClock::shared(noon());
        let state = AppState::build(StateParts {
            base_url: "http://localhost:3002".to_string(),
            storage: Storage::in_memory(),
            clock: clock.clone(),
            bootstrap_admin: BootstrapAdmin {
                email: Email::parse(ADMIN_EMAIL).unwrap(),
                credential: AdminCredential::Password(SecretString::from(PASSWORD)),
            },
            seed_demo_users: true,
            seed_demo_data,
            settings,
        })
        .await
        .unwrap();
        let router = routes::app(state.clone());

        Self {
            state,
            clock,
            router,
        }
    }

    /// Log in through the service layer.
    pub async fn actor(&self, email: &str) -> CurrentUser {
        self.state.users().authenticate(email, PASSWORD).await.unwrap()
    }

    /// Send one request through the full router. Returns the status, the
    /// session cookie if one was set, and the JSON body (`Null` if empty or
    /// not JSON).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Option<String>, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, set_cookie, json)
    }

    /// Log in over HTTP and return the session cookie.
    pub async fn login(&self, email: &str) -> String {
        let (status, cookie, body) = self
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        cookie.expect("login sets a session cookie")
    }
}
