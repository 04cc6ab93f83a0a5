//! Ticket storage trait and types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::SlaConfig;
use crate::ticket::{Priority, SlaFields, Ticket, TicketStatus};

/// Error type for ticket storage operations.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Ticket {ticket_id} is at revision {actual}, expected {expected}")]
    RevisionMismatch {
        ticket_id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Assignee does not exist: user {0}")]
    AssigneeNotFound(i64),

    #[error("Database error: {0}")]
    Database(String),
}

/// Request to store a new ticket.
///
/// Tickets are ingested by an external system, which may carry over the
/// original creation time.
#[derive(Debug, Clone)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub submitted_by: String,
    /// Resolution target in hours.
    pub sla_hours: u32,
    pub assigned_to: Option<i64>,
    pub related_incident: Option<String>,
    pub related_device: Option<String>,
    /// Defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateTicketRequest {
    /// Create a request with the default SLA target for its priority.
    pub fn new(
        title: impl Into<String>,
        priority: Priority,
        submitted_by: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority,
            submitted_by: submitted_by.into(),
            sla_hours: SlaConfig::default().hours_for(priority),
            assigned_to: None,
            related_incident: None,
            related_device: None,
            created_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Use the configured SLA target for this request's priority.
    pub fn with_sla(mut self, sla: &SlaConfig) -> Self {
        self.sla_hours = sla.hours_for(self.priority);
        self
    }

    pub fn with_sla_hours(mut self, hours: u32) -> Self {
        self.sla_hours = hours;
        self
    }

    pub fn with_assigned_to(mut self, user_id: i64) -> Self {
        self.assigned_to = Some(user_id);
        self
    }

    pub fn with_related_incident(mut self, incident: impl Into<String>) -> Self {
        self.related_incident = Some(incident.into());
        self
    }

    pub fn with_related_device(mut self, device: impl Into<String>) -> Self {
        self.related_device = Some(device.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Partial update of a ticket. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<i64>,
    pub notes: Option<String>,
    /// Replaces all three SLA columns when set.
    pub sla: Option<SlaFields>,
    /// Only apply if the stored revision still matches.
    pub expected_revision: Option<i64>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assigned_to.is_none()
            && self.notes.is_none()
            && self.sla.is_none()
    }
}

/// Filter for querying tickets.
///
/// All filters are equality matches; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Status in canonical spelling.
    pub status: Option<String>,
    /// Priority in lowercase.
    pub priority: Option<String>,
    /// Creation date, `YYYY-MM-DD` (UTC).
    pub created_on: Option<String>,
    pub submitted_by: Option<String>,
    pub assigned_to: Option<i64>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_created_on(mut self, date: impl Into<String>) -> Self {
        self.created_on = Some(date.into());
        self
    }

    pub fn with_submitted_by(mut self, submitted_by: impl Into<String>) -> Self {
        self.submitted_by = Some(submitted_by.into());
        self
    }

    pub fn with_assigned_to(mut self, user_id: i64) -> Self {
        self.assigned_to = Some(user_id);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Aggregate counts for the dashboard charts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
    /// Resolved or closed on time.
    pub sla_met: i64,
    /// Resolved or closed late.
    pub sla_breached: i64,
}

/// Trait for ticket storage backends.
///
/// Tickets are never deleted; their history lives in the audit trail.
pub trait TicketStore: Send + Sync {
    /// Store a new ticket with status `Open`.
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter, newest first.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter, ignoring limit and offset.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// One page of tickets plus the unpaginated total.
    fn list_with_total(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), TicketError> {
        let tickets = self.list(filter)?;
        let total = self.count(filter)?;
        Ok((tickets, total))
    }

    /// Apply a partial update, bumping `revision` and `updated_at`.
    fn update(&self, id: &str, update: TicketUpdate) -> Result<Ticket, TicketError>;

    /// Counts by status, priority and SLA outcome.
    fn stats(&self) -> Result<TicketStats, TicketError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_uses_default_sla() {
        let request = CreateTicketRequest::new("VPN down", Priority::Critical, "bob");
        assert_eq!(request.sla_hours, 4);

        let custom = SlaConfig {
            critical_hours: 1,
            ..SlaConfig::default()
        };
        let request = request.with_sla(&custom);
        assert_eq!(request.sla_hours, 1);
    }

    #[test]
    fn test_filter_defaults() {
        let filter = TicketFilter::new();
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);
        assert!(filter.status.is_none());
        assert!(filter.assigned_to.is_none());
    }

    #[test]
    fn test_update_is_empty() {
        assert!(TicketUpdate::default().is_empty());

        let update = TicketUpdate {
            expected_revision: Some(3),
            ..Default::default()
        };
        assert!(update.is_empty());

        let update = TicketUpdate {
            notes: Some("rebooted".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
