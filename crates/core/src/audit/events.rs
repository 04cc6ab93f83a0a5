use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Ticket workflow
    TicketUpdated {
        ticket_id: String,
        updated_by: String,
        from_status: String,
        to_status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assigned_to: Option<i64>,
        notes_changed: bool,
        revision: i64,
    },

    // Administration
    UserCreated {
        actor: String,
        target_user_id: i64,
        username: String,
        role: String,
    },
    UserUpdated {
        actor: String,
        target_user_id: i64,
        /// Names of the changed fields, never their values
        fields: Vec<String>,
    },
    UserDeleted {
        actor: String,
        target_user_id: i64,
        /// Tickets whose assignee was cleared
        tickets_unassigned: usize,
    },
    TeamCreated {
        actor: String,
        team_id: i64,
        name: String,
    },
    TeamDeleted {
        actor: String,
        team_id: i64,
        /// Members removed along with the team
        members_removed: usize,
    },
    MemberAdded {
        actor: String,
        team_id: i64,
        member_id: i64,
        name: String,
    },
    MemberRemoved {
        actor: String,
        team_id: i64,
        member_id: i64,
    },

    // Sessions
    LoginSucceeded {
        username: String,
        source_ip: String,
    },
    LoginFailed {
        username: String,
        source_ip: String,
    },
    Logout {
        username: String,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TicketUpdated { .. } => "ticket_updated",
            Self::UserCreated { .. } => "user_created",
            Self::UserUpdated { .. } => "user_updated",
            Self::UserDeleted { .. } => "user_deleted",
            Self::TeamCreated { .. } => "team_created",
            Self::TeamDeleted { .. } => "team_deleted",
            Self::MemberAdded { .. } => "member_added",
            Self::MemberRemoved { .. } => "member_removed",
            Self::LoginSucceeded { .. } => "login_succeeded",
            Self::LoginFailed { .. } => "login_failed",
            Self::Logout { .. } => "logout",
        }
    }

    /// Extract ticket_id if this event is ticket-related
    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            Self::TicketUpdated { ticket_id, .. } => Some(ticket_id),
            _ => None,
        }
    }

    /// Extract the acting user if this event was triggered by a user action
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TicketUpdated { updated_by, .. } => Some(updated_by),
            Self::UserCreated { actor, .. }
            | Self::UserUpdated { actor, .. }
            | Self::UserDeleted { actor, .. }
            | Self::TeamCreated { actor, .. }
            | Self::TeamDeleted { actor, .. }
            | Self::MemberAdded { actor, .. }
            | Self::MemberRemoved { actor, .. } => Some(actor),
            Self::LoginSucceeded { username, .. }
            | Self::LoginFailed { username, .. }
            | Self::Logout { username } => Some(username),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub ticket_id: Option<String>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}
