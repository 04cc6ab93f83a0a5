//! Team and member administration handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use daemonview_core::{
    audit::AuditEvent,
    team::{
        CreateMemberRequest, CreateTeamRequest, Member, Team, UpdateMemberRequest,
        UpdateTeamRequest,
    },
};

use super::error::ApiError;
use super::middleware::AdminUser;
use crate::state::AppState;

// ============================================================================
// Teams
// ============================================================================

pub async fn list_teams(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Team>>, ApiError> {
    Ok(Json(state.team_store().list_teams()?))
}

pub async fn get_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Team>, ApiError> {
    state
        .team_store()
        .get_team(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Team not found: {}", id)))
}

pub async fn create_team(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    let team = state.team_store().create_team(request)?;

    state
        .audit()
        .emit(AuditEvent::TeamCreated {
            actor: admin.user_id,
            team_id: team.id,
            name: team.name.clone(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn update_team(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateTeamRequest>,
) -> Result<Json<Team>, ApiError> {
    Ok(Json(state.team_store().update_team(id, request)?))
}

pub async fn delete_team(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let members_removed = state.team_store().delete_team(id)?;

    tracing::info!(team_id = id, members_removed, "Team deleted");
    state
        .audit()
        .emit(AuditEvent::TeamDeleted {
            actor: admin.user_id,
            team_id: id,
            members_removed,
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Members
// ============================================================================

pub async fn add_member(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(team_id): Path<i64>,
    Json(request): Json<CreateMemberRequest>,
) -> Result<(StatusCode, Json<Member>), ApiError> {
    let member = state.team_store().add_member(team_id, request)?;

    state
        .audit()
        .emit(AuditEvent::MemberAdded {
            actor: admin.user_id,
            team_id,
            member_id: member.id,
            name: member.name.clone(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_member(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path((team_id, member_id)): Path<(i64, i64)>,
    Json(request): Json<UpdateMemberRequest>,
) -> Result<Json<Member>, ApiError> {
    Ok(Json(
        state
            .team_store()
            .update_member(team_id, member_id, request)?,
    ))
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path((team_id, member_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.team_store().remove_member(team_id, member_id)?;

    state
        .audit()
        .emit(AuditEvent::MemberRemoved {
            actor: admin.user_id,
            team_id,
            member_id,
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}
