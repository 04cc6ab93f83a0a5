//! Filtered, paginated ticket lookups.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::{Priority, Ticket, TicketError, TicketFilter, TicketStats, TicketStatus, TicketStore};
use crate::config::QueryConfig;

/// Error type for ticket queries.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl From<TicketError> for QueryError {
    fn from(e: TicketError) -> Self {
        match e {
            TicketError::NotFound(id) => QueryError::NotFound(id),
            other => QueryError::StorageFailure(other.to_string()),
        }
    }
}

/// Raw equality filters as supplied by a client.
///
/// Empty strings count as unset.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    /// Calendar date `YYYY-MM-DD`, or a full timestamp whose date is used.
    pub created_at: Option<String>,
    pub submitted_by: Option<String>,
    pub assigned_to: Option<i64>,
}

impl TicketQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
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

    /// Translate into a store filter.
    ///
    /// Status input is normalized; values that match no canonical status are
    /// passed through unchanged and so match no ticket.
    fn to_filter(&self) -> TicketFilter {
        let mut filter = TicketFilter::new();
        filter.status = present(&self.status).map(|s| TicketStatus::canonicalize(s).into_owned());
        filter.priority = present(&self.priority).map(|p| match p.parse::<Priority>() {
            Ok(priority) => priority.as_str().to_string(),
            Err(_) => p.to_string(),
        });
        filter.created_on = present(&self.created_at).map(|d| d.chars().take(10).collect());
        filter.submitted_by = present(&self.submitted_by).map(str::to_string);
        filter.assigned_to = self.assigned_to;
        filter
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Build a page request from raw query-string values.
    ///
    /// Missing, non-numeric or zero values fall back to the defaults. Page
    /// sizes above the configured maximum are clamped.
    pub fn from_raw(page: Option<&str>, page_size: Option<&str>, config: &QueryConfig) -> Self {
        let page = parse_positive(page).unwrap_or(1);
        let page_size = parse_positive(page_size)
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size);
        Self { page, page_size }
    }

    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v >= 1)
}

/// One page of query results.
#[derive(Debug, Clone, Serialize)]
pub struct TicketPage {
    pub items: Vec<Ticket>,
    /// Matching tickets before pagination.
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl TicketPage {
    pub fn total_pages(&self) -> i64 {
        let size = i64::from(self.page_size);
        (self.total + size - 1) / size
    }
}

/// Read-only ticket lookups for the dashboard.
pub struct TicketQueryService {
    store: Arc<dyn TicketStore>,
    config: QueryConfig,
}

impl TicketQueryService {
    pub fn new(store: Arc<dyn TicketStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Return one page of tickets matching `query`, newest first, with the total count.
    pub fn query(&self, query: &TicketQuery, page: PageRequest) -> Result<TicketPage, QueryError> {
        let page_size = page.page_size.min(self.config.max_page_size).max(1);
        let page = PageRequest::new(page.page, page_size);

        let filter = query
            .to_filter()
            .with_limit(i64::from(page.page_size))
            .with_offset(page.offset());

        let (items, total) = self.store.list_with_total(&filter).map_err(|e| {
            tracing::error!(error = %e, "Ticket query failed");
            QueryError::from(e)
        })?;

        tracing::debug!(
            page = page.page,
            page_size = page.page_size,
            returned = items.len(),
            total,
            "Ticket query"
        );

        Ok(TicketPage {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    /// Get a single ticket.
    pub fn get(&self, id: &str) -> Result<Ticket, QueryError> {
        self.store
            .get(id)?
            .ok_or_else(|| QueryError::NotFound(id.to_string()))
    }

    /// Counts for the dashboard charts.
    pub fn stats(&self) -> Result<TicketStats, QueryError> {
        self.store.stats().map_err(|e| {
            tracing::error!(error = %e, "Ticket stats failed");
            QueryError::from(e)
        })
    }
}
