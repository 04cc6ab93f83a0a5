//! Login, logout and principal lookup.

use axum::{
    extract::State,
    http::{header, Extensions, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use daemonview_core::{
    audit::AuditEvent,
    auth::SESSION_COOKIE,
    user::User,
    AuthError, Identity,
};

use super::error::{run_blocking, ApiError};
use super::middleware::{auth_request, source_ip, AuthUser};
use crate::metrics::LOGINS_TOTAL;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

fn session_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    HeaderValue::from_str(&cookie).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Exchange username and password for a session token.
///
/// The token is returned in the body and as the `daemonview_session` cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    extensions: Extensions,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if state.authenticator().method_name() != "session" {
        return Err(ApiError::BadRequest(
            "Login is only available with session authentication".to_string(),
        ));
    }

    let source_ip = source_ip(&extensions).to_string();

    // Argon2 verification is CPU-bound
    let outcome = run_blocking({
        let state = state.clone();
        let username = request.username.clone();
        let password = request.password;
        move || state.sessions().login(state.user_store(), &username, &password)
    })
    .await?;

    match outcome {
        Ok((session, user)) => {
            LOGINS_TOTAL.with_label_values(&["success"]).inc();
            tracing::info!(username = %user.username, %source_ip, "Login succeeded");
            state
                .audit()
                .emit(AuditEvent::LoginSucceeded {
                    username: user.username.clone(),
                    source_ip,
                })
                .await;

            let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
            let cookie = session_cookie(&session.token, max_age)?;
            let body = LoginResponse {
                token: session.token,
                expires_at: session.expires_at,
                user,
            };
            Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
        }
        Err(e @ AuthError::InvalidCredentials(_)) => {
            LOGINS_TOTAL.with_label_values(&["failure"]).inc();
            tracing::warn!(username = %request.username, %source_ip, "Login failed");
            state
                .audit()
                .emit(AuditEvent::LoginFailed {
                    username: request.username,
                    source_ip,
                })
                .await;
            Err(ApiError::from(e))
        }
        Err(e) => Err(ApiError::from(e)),
    }
}

/// Revoke the presented session and clear the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<Response, ApiError> {
    let request = auth_request(&headers, source_ip(&extensions));
    let token = request
        .bearer_token()
        .or_else(|| request.cookie(SESSION_COOKIE));

    if let Some(token) = token {
        if state.sessions().revoke(token) {
            state
                .audit()
                .emit(AuditEvent::Logout {
                    username: identity.user_id,
                })
                .await;
        }
    }

    let cookie = session_cookie("", 0)?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

/// The principal the request was authenticated as.
pub async fn me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}
