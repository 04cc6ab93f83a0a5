//! Ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use daemonview_core::ticket::{
    PageRequest, Ticket, TicketEdit, TicketQuery, TicketStats, Transitions,
};

use super::error::ApiError;
use super::middleware::AuthUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing tickets.
///
/// Everything is taken as a string so malformed paging falls back to the
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListTicketsParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    pub created_at: Option<String>,
    pub submitted_by: Option<String>,
    /// User id of the assignee.
    pub assigned_to: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
    /// Page size.
    pub limit: Option<String>,
}

impl ListTicketsParams {
    fn to_query(&self) -> Result<TicketQuery, ApiError> {
        let mut query = TicketQuery::new();
        if let Some(status) = &self.status {
            query = query.with_status(status);
        }
        if let Some(priority) = &self.priority {
            query = query.with_priority(priority);
        }
        if let Some(created_at) = &self.created_at {
            query = query.with_created_at(created_at);
        }
        if let Some(submitted_by) = &self.submitted_by {
            query = query.with_submitted_by(submitted_by);
        }
        if let Some(assigned_to) = self.assigned_to.as_deref().map(str::trim) {
            if !assigned_to.is_empty() {
                let user_id = assigned_to.parse::<i64>().map_err(|_| {
                    ApiError::BadRequest(format!("assigned_to must be a user id: {}", assigned_to))
                })?;
                query = query.with_assigned_to(user_id);
            }
        }
        Ok(query)
    }
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// List tickets with optional filters
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let query = params.to_query()?;
    let page_request = PageRequest::from_raw(
        params.page.as_deref(),
        params.limit.as_deref(),
        state.queries().config(),
    );

    let page = state.queries().query(&query, page_request)?;
    let total_pages = page.total_pages();

    Ok(Json(ListTicketsResponse {
        tickets: page.items,
        total: page.total,
        page: page.page,
        limit: page.page_size,
        total_pages,
    }))
}

/// Counts for the dashboard charts
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<TicketStats>, ApiError> {
    Ok(Json(state.queries().stats()?))
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(state.queries().get(&id)?))
}

/// Statuses the ticket may move to next
pub async fn get_transitions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Transitions>, ApiError> {
    Ok(Json(state.workflow().allowed_transitions(&id)?))
}

/// Change status, assignee or notes
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    Json(edit): Json<TicketEdit>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state.workflow().apply(&principal, &id, edit)?;
    Ok(Json(ticket))
}
