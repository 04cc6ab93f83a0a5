//! SLA deadline and compliance bookkeeping.

use chrono::{DateTime, Duration, Utc};

use super::{Ticket, TicketStatus};

/// Deadline for a ticket created at `created_at` with the given target.
pub fn deadline_for(created_at: DateTime<Utc>, sla_hours: u32) -> DateTime<Utc> {
    created_at + Duration::hours(i64::from(sla_hours))
}

/// SLA columns after a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaFields {
    pub completed_date: Option<DateTime<Utc>>,
    pub close_date: Option<DateTime<Utc>>,
    pub within_sla: Option<bool>,
}

impl SlaFields {
    /// Current SLA columns of a ticket.
    pub fn of(ticket: &Ticket) -> Self {
        Self {
            completed_date: ticket.completed_date,
            close_date: ticket.close_date,
            within_sla: ticket.within_sla,
        }
    }
}

/// Recompute the SLA columns for a ticket moving to `next` at `now`.
///
/// Resolving stamps `completed_date`, closing stamps `close_date` and keeps an
/// earlier resolution. Going back to an active status clears both. Compliance
/// is judged on the first of resolution or closure.
pub fn on_transition(ticket: &Ticket, next: TicketStatus, now: DateTime<Utc>) -> SlaFields {
    if next == ticket.status {
        return SlaFields::of(ticket);
    }

    let (completed_date, close_date) = match next {
        TicketStatus::Open | TicketStatus::InProgress => (None, None),
        TicketStatus::Resolved => (Some(now), None),
        TicketStatus::Closed => (ticket.completed_date, Some(now)),
    };

    SlaFields {
        completed_date,
        close_date,
        within_sla: completed_date
            .or(close_date)
            .map(|finished| finished <= ticket.deadline),
    }
}
