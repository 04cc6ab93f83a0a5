//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use daemonview_core::{AuthError, AuthRequest, Identity};

use super::error::ApiError;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Build an [`AuthRequest`] from request headers. Header names are lowercased.
pub(crate) fn auth_request(headers: &HeaderMap, source_ip: IpAddr) -> AuthRequest {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    AuthRequest { headers, source_ip }
}

/// Peer address if the server was started with connect info, else localhost.
pub(crate) fn source_ip(extensions: &axum::http::Extensions) -> IpAddr {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Authentication middleware that validates requests using the configured authenticator.
///
/// On success the resulting [`Identity`] is stored in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let authenticator = state.authenticator();

    if authenticator.method_name() == "none" {
        request.extensions_mut().insert(Identity::anonymous());
        return Ok(next.run(request).await);
    }

    let auth_request = auth_request(request.headers(), source_ip(request.extensions()));

    match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(e) => {
            let reason = match &e {
                AuthError::NotAuthenticated => "not_authenticated",
                AuthError::InvalidCredentials(_) => "invalid_credentials",
                AuthError::SessionExpired => "session_expired",
                _ => "internal_error",
            };
            AUTH_FAILURES_TOTAL.with_label_values(&[reason]).inc();
            Err(ApiError::from(e))
        }
    }
}

/// Extractor for the authenticated principal.
///
/// Falls back to the anonymous identity if no identity is present, which
/// only happens for routes outside the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let identity = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_else(Identity::anonymous);
        std::future::ready(Ok(AuthUser(identity)))
    }
}

/// Extractor that only admits admin principals.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = match parts.extensions.get::<Identity>() {
            Some(identity) if identity.is_admin() => Ok(AdminUser(identity.clone())),
            Some(identity) => {
                tracing::warn!(user = %identity.user_id, "Admin route refused");
                Err(ApiError::Forbidden("Admin role required".to_string()))
            }
            None => Err(ApiError::Unauthorized("Authentication required".to_string())),
        };
        std::future::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use daemonview_core::{
        audit::create_audit_system,
        config::{AuthConfig, AuthMethod, Config, DatabaseConfig, ServerConfig},
        create_authenticator,
        user::{CreateUserRequest, UserRole},
        SessionManager,
    };
    use tower::ServiceExt;

    use crate::state::Stores;

    async fn dummy_handler() -> &'static str {
        "OK"
    }

    async fn whoami(AuthUser(identity): AuthUser) -> String {
        identity.user_id
    }

    async fn admin_only(AdminUser(identity): AdminUser) -> String {
        identity.user_id
    }

    fn auth_config(method: AuthMethod, api_key: Option<&str>) -> AuthConfig {
        AuthConfig {
            method,
            api_key: api_key.map(String::from),
            session_ttl_secs: 3600,
            bootstrap_admin: None,
        }
    }

    fn create_test_state(auth: AuthConfig) -> (Arc<AppState>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let stores = Stores::open(&db_path).unwrap();

        let sessions = Arc::new(SessionManager::new(auth.session_ttl_secs));
        let authenticator =
            create_authenticator(&auth, Arc::clone(&sessions), Arc::clone(&stores.users))
                .unwrap();
        let (audit_handle, _writer) = create_audit_system(Arc::clone(&stores.audit), 16);

        let config = Config {
            auth,
            server: ServerConfig::default(),
            database: DatabaseConfig { path: db_path },
            query: Default::default(),
            workflow: Default::default(),
            sla: Default::default(),
        };

        let state = Arc::new(AppState::new(
            config,
            Arc::from(authenticator),
            sessions,
            audit_handle,
            stores,
        ));
        (state, temp_dir)
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(dummy_handler))
            .route("/whoami", get(whoami))
            .route("/admin", get(admin_only))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn body_string(response: Response) -> String {
        use http_body_util::BodyExt;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_none_auth_allows_all() {
        let (state, _dir) = create_test_state(auth_config(AuthMethod::None, None));

        let request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_api_key_auth_valid() {
        let (state, _dir) = create_test_state(auth_config(AuthMethod::ApiKey, Some("secret-key")));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer secret-key")
            .body(Body::empty())
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_key_auth_invalid() {
        let (state, _dir) = create_test_state(auth_config(AuthMethod::ApiKey, Some("secret-key")));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer wrong-key")
            .body(Body::empty())
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_key_auth_missing() {
        let (state, _dir) = create_test_state(auth_config(AuthMethod::ApiKey, Some("secret-key")));

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_x_api_key_header() {
        let (state, _dir) = create_test_state(auth_config(AuthMethod::ApiKey, Some("secret-key")));

        let request = Request::builder()
            .uri("/whoami")
            .header("X-API-Key", "secret-key")
            .body(Body::empty())
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "api_key_user");
    }

    #[tokio::test]
    async fn test_session_cookie_and_admin_guard() {
        let (state, _dir) = create_test_state(auth_config(AuthMethod::Session, None));
        let viewer = state
            .user_store()
            .create(CreateUserRequest::new("vera", "vera@example.com", "pw").with_role(UserRole::Viewer))
            .unwrap();
        let session = state.sessions().issue(&viewer).unwrap();
        let cookie = format!("daemonview_session={}", session.token);

        let request = Request::builder()
            .uri("/whoami")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "vera");

        let request = Request::builder()
            .uri("/admin")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_revoked_session_is_rejected() {
        let (state, _dir) = create_test_state(auth_config(AuthMethod::Session, None));
        let user = state
            .user_store()
            .create(CreateUserRequest::new("omar", "omar@example.com", "pw"))
            .unwrap();
        let session = state.sessions().issue(&user).unwrap();
        state.sessions().revoke(&session.token);

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {}", session.token))
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
