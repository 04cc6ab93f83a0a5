use chrono::{DateTime, Utc};
use thiserror::Error;

use super::AuditRecord;

/// Largest page the audit log hands out in one query.
pub const MAX_AUDIT_PAGE: i64 = 1000;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Criteria for reading the audit trail.
///
/// `limit` and `offset` only apply to [`AuditStore::query`]; `count` ignores them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub ticket_id: Option<String>,
    pub event_type: Option<String>,
    /// Actor, as recorded from the principal's `user_id`.
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_ticket_id(mut self, ticket_id: impl Into<String>) -> Self {
        self.ticket_id = Some(ticket_id.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Apply client-supplied paging, clamping the limit to `1..=MAX_AUDIT_PAGE`
    /// and negative offsets to zero.
    pub fn paged(self, limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = limit.unwrap_or(self.limit).clamp(1, MAX_AUDIT_PAGE);
        let offset = offset.unwrap_or(0).max(0);
        self.with_limit(limit).with_offset(offset)
    }
}

/// Append-only storage for audit records.
pub trait AuditStore: Send + Sync {
    /// Persist a record and return its id.
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    /// Newest first.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paged_clamps() {
        let filter = AuditFilter::new().paged(Some(50_000), Some(-3));
        assert_eq!(filter.limit, MAX_AUDIT_PAGE);
        assert_eq!(filter.offset, 0);

        let filter = AuditFilter::new().paged(Some(0), None);
        assert_eq!(filter.limit, 1);
    }

    #[test]
    fn test_paged_keeps_default_limit() {
        let filter = AuditFilter::new()
            .with_event_type("ticket_updated")
            .paged(None, Some(20));
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 20);
        assert_eq!(filter.event_type.as_deref(), Some("ticket_updated"));
    }
}
