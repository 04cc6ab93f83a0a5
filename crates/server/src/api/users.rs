//! User administration handlers.
//!
//! Any authenticated principal may read accounts (the dashboard needs them
//! to pick assignees); changes require an admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use daemonview_core::{
    audit::AuditEvent,
    user::{CreateUserRequest, UpdateUserRequest, User},
};

use super::error::{run_blocking, ApiError};
use super::middleware::AdminUser;
use crate::state::AppState;

pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.user_store().list()?))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    state
        .user_store()
        .get(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = run_blocking({
        let state = state.clone();
        move || state.user_store().create(request)
    })
    .await??;

    tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "User created");
    state
        .audit()
        .emit(AuditEvent::UserCreated {
            actor: admin.user_id,
            target_user_id: user.id,
            username: user.username.clone(),
            role: user.role.to_string(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    if request.is_empty() {
        return Err(ApiError::BadRequest(
            "Nothing to update: expected email, role or password".to_string(),
        ));
    }

    let fields: Vec<String> = [
        ("email", request.email.is_some()),
        ("role", request.role.is_some()),
        ("password", request.password.is_some()),
    ]
    .into_iter()
    .filter(|(_, changed)| *changed)
    .map(|(name, _)| name.to_string())
    .collect();

    // A password change hashes, so this runs off the executor too
    let user = run_blocking({
        let state = state.clone();
        move || state.user_store().update(id, request)
    })
    .await??;

    state
        .audit()
        .emit(AuditEvent::UserUpdated {
            actor: admin.user_id,
            target_user_id: user.id,
            fields,
        })
        .await;

    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let tickets_unassigned = state.user_store().delete(id)?;
    let revoked = state.sessions().revoke_user(id);

    tracing::info!(
        user_id = id,
        sessions_revoked = revoked,
        tickets_unassigned,
        "User deleted"
    );
    state
        .audit()
        .emit(AuditEvent::UserDeleted {
            actor: admin.user_id,
            target_user_id: id,
            tickets_unassigned,
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}
