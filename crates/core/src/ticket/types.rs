//! Core ticket data types.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Status
// ============================================================================

/// Canonical ticket status.
///
/// Serialized in its canonical spelling (`Open`, `In_Progress`, `Resolved`,
/// `Closed`). Client input goes through [`TicketStatus::normalize`] first, so
/// `"in progress"`, `"IN-PROGRESS"` and `"In_Progress"` are the same status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TicketStatus {
    Open,
    #[serde(rename = "In_Progress")]
    InProgress,
    Resolved,
    Closed,
}

/// Returned when a status string matches no canonical status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown ticket status: {0}")]
pub struct UnknownStatus(pub String);

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    /// Canonical spelling, as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In_Progress",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
        }
    }

    /// Match free-form input against the canonical set.
    ///
    /// Case is ignored and runs of spaces, underscores or hyphens count as a
    /// single separator.
    pub fn normalize(input: &str) -> Option<Self> {
        let key = input
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|part| !part.is_empty())
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join("_");

        match key.as_str() {
            "open" => Some(TicketStatus::Open),
            "in_progress" => Some(TicketStatus::InProgress),
            "resolved" => Some(TicketStatus::Resolved),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }

    /// Canonical spelling when the input normalizes, the input itself otherwise.
    pub fn canonicalize(input: &str) -> Cow<'_, str> {
        match Self::normalize(input) {
            Some(status) => Cow::Borrowed(status.as_str()),
            None => Cow::Borrowed(input),
        }
    }

    /// Statuses reachable from this one.
    pub fn allowed_next(&self) -> &'static [TicketStatus] {
        match self {
            TicketStatus::Open => &[
                TicketStatus::InProgress,
                TicketStatus::Resolved,
                TicketStatus::Closed,
            ],
            TicketStatus::InProgress => &[TicketStatus::Resolved, TicketStatus::Closed],
            TicketStatus::Resolved => &[TicketStatus::InProgress, TicketStatus::Closed],
            TicketStatus::Closed => &[],
        }
    }

    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Returns true once work on the ticket is finished (resolved or closed).
    pub fn is_done(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Ticket priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown priority: {0}")]
pub struct UnknownPriority(pub String);

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(UnknownPriority(s.to_string())),
        }
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// A helpdesk ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Unique identifier (UUID).
    pub id: String,

    pub title: String,

    pub description: String,

    pub priority: Priority,

    pub status: TicketStatus,

    /// Who reported the problem.
    pub submitted_by: String,

    /// Id of the user working the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Free-text reference to a related incident (not a foreign key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_incident: Option<String>,

    /// Free-text reference to a related device (not a foreign key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_device: Option<String>,

    /// Resolution target in hours, fixed at creation.
    pub sla_hours: u32,

    /// `created_at + sla_hours`.
    pub deadline: DateTime<Utc>,

    /// Unset until the ticket is resolved or closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within_sla: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_date: Option<DateTime<Utc>>,

    /// Incremented by every mutation.
    pub revision: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_in_progress_variants() {
        for input in [
            "in progress",
            "In_Progress",
            "IN PROGRESS",
            "in-progress",
            "  in   progress ",
            "IN__PROGRESS",
        ] {
            assert_eq!(
                TicketStatus::normalize(input),
                Some(TicketStatus::InProgress),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_normalize_simple_statuses() {
        assert_eq!(TicketStatus::normalize("OPEN"), Some(TicketStatus::Open));
        assert_eq!(TicketStatus::normalize("resolved"), Some(TicketStatus::Resolved));
        assert_eq!(TicketStatus::normalize("Closed"), Some(TicketStatus::Closed));
    }

    #[test]
    fn test_normalize_unknown() {
        assert_eq!(TicketStatus::normalize("pending"), None);
        assert_eq!(TicketStatus::normalize(""), None);
        assert_eq!(TicketStatus::normalize("inprogress"), None);
    }

    #[test]
    fn test_canonicalize_passes_unknown_through() {
        assert_eq!(TicketStatus::canonicalize("in progress"), "In_Progress");
        assert_eq!(TicketStatus::canonicalize("Waiting"), "Waiting");
    }

    #[test]
    fn test_transition_table() {
        use TicketStatus::*;

        assert_eq!(Open.allowed_next(), &[InProgress, Resolved, Closed]);
        assert_eq!(InProgress.allowed_next(), &[Resolved, Closed]);
        assert_eq!(Resolved.allowed_next(), &[InProgress, Closed]);
        assert!(Closed.allowed_next().is_empty());
    }

    #[test]
    fn test_no_status_transitions_to_itself_or_back_to_open() {
        for status in TicketStatus::ALL {
            assert!(!status.can_transition_to(status));
            assert!(!status.can_transition_to(TicketStatus::Open));
        }
    }

    #[test]
    fn test_only_closed_is_terminal() {
        assert!(TicketStatus::Closed.is_terminal());
        assert!(!TicketStatus::Open.is_terminal());
        assert!(!TicketStatus::InProgress.is_terminal());
        assert!(!TicketStatus::Resolved.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, r#""In_Progress""#);

        let parsed: TicketStatus = serde_json::from_str(r#""Resolved""#).unwrap();
        assert_eq!(parsed, TicketStatus::Resolved);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("in progress".parse::<TicketStatus>(), Ok(TicketStatus::InProgress));
        assert!("bogus".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_priority_parsing_and_serialization() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(" low ".parse::<Priority>(), Ok(Priority::Low));
        assert!("urgent".parse::<Priority>().is_err());

        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, r#""critical""#);
    }
}
