//! Common test utilities for in-process API testing.
//!
//! The fixture builds the real router over SQLite stores in a temporary
//! directory and drives it with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use daemonview_core::{
    audit::{create_audit_system, AuditFilter, AuditRecord, AuditStore},
    config::{
        AuthConfig, AuthMethod, Config, DatabaseConfig, QueryConfig, ServerConfig, SlaConfig,
        WorkflowConfig,
    },
    create_authenticator,
    user::{CreateUserRequest, User, UserRole, UserStore},
    SessionManager,
};
use daemonview_server::state::{AppState, Stores};

/// Re-export fixtures for test convenience
pub use daemonview_core::testing::fixtures;

/// In-process server over a throwaway database.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_list() {
///     let fixture = TestFixture::new().await;
///     let response = fixture.get("/api/v1/tickets").await;
///     assert_status!(response, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub stores: Stores,
    pub state: Arc<AppState>,
    /// Keeps the database alive for the fixture's lifetime
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub auth_method: AuthMethod,
    pub api_key: Option<String>,
    pub enforce_transitions: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            auth_method: AuthMethod::None,
            api_key: None,
            enforce_transitions: true,
        }
    }
}

impl TestConfig {
    pub fn with_sessions() -> Self {
        Self {
            auth_method: AuthMethod::Session,
            ..Default::default()
        }
    }

    pub fn with_api_key(key: &str) -> Self {
        Self {
            auth_method: AuthMethod::ApiKey,
            api_key: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn without_enforcement() -> Self {
        Self {
            enforce_transitions: false,
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Fixture with authentication disabled.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            auth: AuthConfig {
                method: test_config.auth_method,
                api_key: test_config.api_key,
                session_ttl_secs: 3600,
                bootstrap_admin: None,
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
                dashboard_dir: None,
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            query: QueryConfig::default(),
            workflow: WorkflowConfig {
                enforce_transitions: test_config.enforce_transitions,
            },
            sla: SlaConfig::default(),
        };

        let stores = Stores::open(&db_path).expect("Failed to open stores");
        let sessions = Arc::new(SessionManager::new(config.auth.session_ttl_secs));
        let authenticator =
            create_authenticator(&config.auth, Arc::clone(&sessions), Arc::clone(&stores.users))
                .expect("Failed to create authenticator");

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&stores.audit), 100);
        tokio::spawn(audit_writer.run());

        let state = Arc::new(AppState::new(
            config,
            Arc::from(authenticator),
            sessions,
            audit_handle,
            stores.clone(),
        ));
        let router = daemonview_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            stores,
            state,
            temp_dir,
        }
    }

    /// Create a dashboard account directly in the store.
    pub fn create_user(&self, username: &str, password: &str, role: UserRole) -> User {
        self.stores
            .users
            .create(
                CreateUserRequest::new(username, format!("{}@example.com", username), password)
                    .with_role(role),
            )
            .expect("Failed to create user")
    }

    /// Log in through the API and return the session token.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post(
                "/api/v1/auth/login",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.body["token"]
            .as_str()
            .expect("login response has a token")
            .to_string()
    }

    /// Wait until the audit writer has persisted at least `count` matching records.
    pub async fn wait_for_audit(&self, filter: AuditFilter, count: usize) -> Vec<AuditRecord> {
        for _ in 0..50 {
            let records = self.stores.audit.query(&filter).expect("audit query");
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.stores.audit.query(&filter).expect("audit query")
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send("GET", path, None, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.send("POST", path, Some(body), None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.send("PUT", path, Some(body), None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send("DELETE", path, None, None).await
    }

    /// Send a request carrying `Authorization: Bearer <token>`.
    pub async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        if let Some(token) = token {
            request_builder = request_builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.dispatch(request_builder.body(body).unwrap()).await
    }

    /// Send a prepared request.
    pub async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
