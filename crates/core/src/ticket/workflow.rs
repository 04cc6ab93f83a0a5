//! Ticket status workflow.
//!
//! Every mutation of a ticket goes through [`TicketWorkflow::apply`], which
//! validates the whole edit before anything is written.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{sla, Ticket, TicketError, TicketStatus, TicketStore, TicketUpdate};
use crate::audit::{AuditEvent, AuditHandle};
use crate::auth::Identity;
use crate::config::WorkflowConfig;
use crate::db;
use crate::user::{UserError, UserStore};

/// Error type for ticket edits.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Ticket {ticket_id} cannot move from {from} to {to}")]
    InvalidTransition {
        ticket_id: String,
        from: TicketStatus,
        to: TicketStatus,
    },

    #[error("Ticket {ticket_id} was modified concurrently (revision {actual}, expected {expected})")]
    Conflict {
        ticket_id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl From<TicketError> for WorkflowError {
    fn from(e: TicketError) -> Self {
        match e {
            TicketError::NotFound(id) => WorkflowError::NotFound(format!("Ticket {}", id)),
            TicketError::RevisionMismatch {
                ticket_id,
                expected,
                actual,
            } => WorkflowError::Conflict {
                ticket_id,
                expected,
                actual,
            },
            TicketError::AssigneeNotFound(user_id) => {
                WorkflowError::NotFound(format!("User {}", user_id))
            }
            TicketError::Database(msg) => WorkflowError::StorageFailure(msg),
        }
    }
}

impl From<UserError> for WorkflowError {
    fn from(e: UserError) -> Self {
        WorkflowError::StorageFailure(e.to_string())
    }
}

/// A requested edit as supplied by a client.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketEdit {
    #[serde(default)]
    pub status: Option<String>,
    /// Username of the new assignee.
    #[serde(default)]
    pub assigned_to_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Reject the edit unless the ticket is still at this revision.
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

impl TicketEdit {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn assign(username: impl Into<String>) -> Self {
        Self {
            assigned_to_name: Some(username.into()),
            ..Default::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_assignee(mut self, username: impl Into<String>) -> Self {
        self.assigned_to_name = Some(username.into());
        self
    }

    pub fn with_expected_revision(mut self, revision: i64) -> Self {
        self.expected_revision = Some(revision);
        self
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Current status of a ticket and where it may go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transitions {
    pub current: TicketStatus,
    pub allowed: Vec<TicketStatus>,
}

/// Invoked with `(from, to)` whenever an edit changes a ticket's status.
pub type TransitionCallback = Arc<dyn Fn(TicketStatus, TicketStatus) + Send + Sync>;

/// Validates and applies ticket edits.
pub struct TicketWorkflow {
    tickets: Arc<dyn TicketStore>,
    users: Arc<dyn UserStore>,
    config: WorkflowConfig,
    audit: Option<AuditHandle>,
    on_transition: Option<TransitionCallback>,
}

impl TicketWorkflow {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        users: Arc<dyn UserStore>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            tickets,
            users,
            config,
            audit: None,
            on_transition: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_transition_callback(mut self, callback: TransitionCallback) -> Self {
        self.on_transition = Some(callback);
        self
    }

    /// Statuses the ticket may move to from where it is now.
    pub fn allowed_transitions(&self, ticket_id: &str) -> Result<Transitions, WorkflowError> {
        let ticket = self.load(ticket_id)?;
        Ok(Transitions {
            current: ticket.status,
            allowed: ticket.status.allowed_next().to_vec(),
        })
    }

    /// Validate and apply an edit on behalf of `principal`.
    ///
    /// Either every requested field is written or none is. The write only
    /// succeeds if the ticket is still at the revision that was validated.
    pub fn apply(
        &self,
        principal: &Identity,
        ticket_id: &str,
        edit: TicketEdit,
    ) -> Result<Ticket, WorkflowError> {
        let requested_status = present(&edit.status);
        let assignee_name = present(&edit.assigned_to_name);

        if requested_status.is_none() && assignee_name.is_none() {
            return Err(WorkflowError::InvalidRequest(
                "status or assigned_to_name is required".to_string(),
            ));
        }

        let next = requested_status
            .map(|s| {
                TicketStatus::normalize(s)
                    .ok_or_else(|| WorkflowError::InvalidRequest(format!("Unknown status: {}", s)))
            })
            .transpose()?;

        let ticket = self.load(ticket_id)?;

        if let Some(expected) = edit.expected_revision {
            if expected != ticket.revision {
                return Err(WorkflowError::Conflict {
                    ticket_id: ticket.id,
                    expected,
                    actual: ticket.revision,
                });
            }
        }

        let status_change = next.filter(|n| *n != ticket.status);

        if let Some(to) = status_change {
            if self.config.enforce_transitions && !ticket.status.can_transition_to(to) {
                tracing::info!(
                    ticket_id = %ticket.id,
                    from = %ticket.status,
                    to = %to,
                    "Rejected status transition"
                );
                return Err(WorkflowError::InvalidTransition {
                    ticket_id: ticket.id,
                    from: ticket.status,
                    to,
                });
            }
        }

        let assigned_to = match assignee_name {
            Some(name) => Some(
                self.users
                    .find_by_username(name)?
                    .ok_or_else(|| WorkflowError::NotFound(format!("User {}", name)))?
                    .id,
            ),
            None => None,
        };

        let notes = present(&edit.notes).map(str::to_string);
        let notes_changed = notes.is_some();

        let update = TicketUpdate {
            status: status_change,
            assigned_to,
            notes,
            sla: status_change.map(|to| sla::on_transition(&ticket, to, db::now())),
            expected_revision: Some(ticket.revision),
        };

        let updated = self.tickets.update(&ticket.id, update).map_err(|e| {
            match &e {
                TicketError::RevisionMismatch { .. } => {
                    tracing::warn!(ticket_id = %ticket.id, "Concurrent ticket edit rejected")
                }
                _ => tracing::error!(ticket_id = %ticket.id, error = %e, "Ticket update failed"),
            }
            WorkflowError::from(e)
        })?;

        tracing::info!(
            ticket_id = %updated.id,
            from = %ticket.status,
            to = %updated.status,
            updated_by = %principal.user_id,
            revision = updated.revision,
            "Ticket updated"
        );

        if let Some(to) = status_change {
            if let Some(ref callback) = self.on_transition {
                callback(ticket.status, to);
            }
        }

        if let Some(ref audit) = self.audit {
            audit.try_emit(AuditEvent::TicketUpdated {
                ticket_id: updated.id.clone(),
                updated_by: principal.user_id.clone(),
                from_status: ticket.status.to_string(),
                to_status: updated.status.to_string(),
                assigned_to,
                notes_changed,
                revision: updated.revision,
            });
        }

        Ok(updated)
    }

    fn load(&self, ticket_id: &str) -> Result<Ticket, WorkflowError> {
        self.tickets
            .get(ticket_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("Ticket {}", ticket_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{CreateTicketRequest, Priority, SqliteTicketStore};
    use crate::user::{CreateUserRequest, SqliteUserStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        tickets: Arc<SqliteTicketStore>,
        workflow: TicketWorkflow,
    }

    fn fixture(config: WorkflowConfig) -> Fixture {
        let tickets = Arc::new(SqliteTicketStore::in_memory().unwrap());
        let users = Arc::new(SqliteUserStore::in_memory().unwrap());
        users
            .create(CreateUserRequest::new("bob", "bob@example.com", "pw"))
            .unwrap();
        let workflow = TicketWorkflow::new(
            Arc::clone(&tickets) as Arc<dyn TicketStore>,
            users,
            config,
        );
        Fixture { tickets, workflow }
    }

    fn open_ticket(store: &SqliteTicketStore) -> Ticket {
        store
            .create(CreateTicketRequest::new("Monitor flickers", Priority::Medium, "alice"))
            .unwrap()
    }

    fn agent() -> Identity {
        Identity::anonymous()
    }

    #[test]
    fn test_empty_edit_is_invalid() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);

        let result = f.workflow.apply(&agent(), &ticket.id, TicketEdit::default());
        assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))));

        let notes_only = TicketEdit::default().with_notes("just a note");
        let result = f.workflow.apply(&agent(), &ticket.id, notes_only);
        assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))));

        let blank = TicketEdit::status("  ");
        let result = f.workflow.apply(&agent(), &ticket.id, blank);
        assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))));
    }

    #[test]
    fn test_unknown_status_is_invalid() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);

        let result = f.workflow.apply(&agent(), &ticket.id, TicketEdit::status("Pending"));
        assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))));
    }

    #[test]
    fn test_missing_ticket() {
        let f = fixture(WorkflowConfig::default());
        let result = f.workflow.apply(&agent(), "nope", TicketEdit::status("Closed"));
        assert!(matches!(result, Err(WorkflowError::NotFound(_))));
    }

    #[test]
    fn test_resolve_open_ticket() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);

        let updated = f
            .workflow
            .apply(&agent(), &ticket.id, TicketEdit::status("resolved"))
            .unwrap();

        assert_eq!(updated.status, TicketStatus::Resolved);
        assert!(updated.updated_at > ticket.updated_at);
        assert!(updated.completed_date.is_some());
        assert_eq!(updated.within_sla, Some(true));
        assert_eq!(updated.revision, ticket.revision + 1);
    }

    #[test]
    fn test_assign_by_username() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);

        let updated = f
            .workflow
            .apply(&agent(), &ticket.id, TicketEdit::assign("bob").with_notes("on it"))
            .unwrap();

        assert!(updated.assigned_to.is_some());
        assert_eq!(updated.status, TicketStatus::Open);
        assert_eq!(updated.notes.as_deref(), Some("on it"));
    }

    #[test]
    fn test_unknown_assignee_leaves_ticket_unchanged() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);

        let edit = TicketEdit::status("In Progress").with_assignee("ghost_user");
        let result = f.workflow.apply(&agent(), &ticket.id, edit);

        assert!(matches!(result, Err(WorkflowError::NotFound(_))));
        assert_eq!(f.tickets.get(&ticket.id).unwrap().unwrap(), ticket);
    }

    #[test]
    fn test_closed_is_terminal_when_enforced() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);
        f.workflow
            .apply(&agent(), &ticket.id, TicketEdit::status("Closed"))
            .unwrap();

        let result = f.workflow.apply(&agent(), &ticket.id, TicketEdit::status("Open"));
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidTransition {
                from: TicketStatus::Closed,
                to: TicketStatus::Open,
                ..
            })
        ));
    }

    #[test]
    fn test_same_status_is_accepted() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);
        f.workflow
            .apply(&agent(), &ticket.id, TicketEdit::status("Closed"))
            .unwrap();

        let updated = f
            .workflow
            .apply(&agent(), &ticket.id, TicketEdit::status("closed").with_assignee("bob"))
            .unwrap();
        assert_eq!(updated.status, TicketStatus::Closed);
        assert!(updated.assigned_to.is_some());
    }

    #[test]
    fn test_enforcement_off_persists_any_canonical_status() {
        let f = fixture(WorkflowConfig {
            enforce_transitions: false,
        });
        let ticket = open_ticket(&f.tickets);
        f.workflow
            .apply(&agent(), &ticket.id, TicketEdit::status("Closed"))
            .unwrap();

        let reopened = f
            .workflow
            .apply(&agent(), &ticket.id, TicketEdit::status("open"))
            .unwrap();
        assert_eq!(reopened.status, TicketStatus::Open);
        assert_eq!(reopened.close_date, None);
        assert_eq!(reopened.within_sla, None);
    }

    #[test]
    fn test_stale_expected_revision_conflicts() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);
        f.workflow
            .apply(&agent(), &ticket.id, TicketEdit::status("In_Progress"))
            .unwrap();

        let edit = TicketEdit::status("Resolved").with_expected_revision(ticket.revision);
        let result = f.workflow.apply(&agent(), &ticket.id, edit);
        assert!(matches!(result, Err(WorkflowError::Conflict { .. })));

        let current = f.tickets.get(&ticket.id).unwrap().unwrap();
        assert_eq!(current.status, TicketStatus::InProgress);
    }

    #[test]
    fn test_allowed_transitions() {
        let f = fixture(WorkflowConfig::default());
        let ticket = open_ticket(&f.tickets);

        let transitions = f.workflow.allowed_transitions(&ticket.id).unwrap();
        assert_eq!(transitions.current, TicketStatus::Open);
        assert_eq!(
            transitions.allowed,
            vec![
                TicketStatus::InProgress,
                TicketStatus::Resolved,
                TicketStatus::Closed
            ]
        );
    }

    #[test]
    fn test_transition_callback_fires_on_status_change_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let f = fixture(WorkflowConfig::default());
        let callback: TransitionCallback = Arc::new(move |from: TicketStatus, to: TicketStatus| {
            assert_eq!(from, TicketStatus::Open);
            assert_eq!(to, TicketStatus::InProgress);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let workflow = f.workflow.with_transition_callback(callback);
        let ticket = open_ticket(&f.tickets);

        workflow
            .apply(&agent(), &ticket.id, TicketEdit::status("in-progress"))
            .unwrap();
        workflow
            .apply(&agent(), &ticket.id, TicketEdit::assign("bob"))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_audit_event_emitted() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        let f = fixture(WorkflowConfig::default());
        let workflow = f.workflow.with_audit(AuditHandle::new(tx));
        let ticket = open_ticket(&f.tickets);

        workflow
            .apply(&Identity::operator(), &ticket.id, TicketEdit::status("Resolved"))
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        match envelope.event {
            AuditEvent::TicketUpdated {
                ticket_id,
                updated_by,
                from_status,
                to_status,
                ..
            } => {
                assert_eq!(ticket_id, ticket.id);
                assert_eq!(updated_by, "api_key_user");
                assert_eq!(from_status, "Open");
                assert_eq!(to_status, "Resolved");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
