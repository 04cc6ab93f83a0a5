//! Testing utilities shared by unit and integration tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use daemonview_core::testing::fixtures;
//! use daemonview_core::ticket::{SqliteTicketStore, TicketStatus};
//!
//! let store = SqliteTicketStore::in_memory()?;
//! let closed = fixtures::seed_tickets(&store, 25, TicketStatus::Closed);
//! ```

mod mock_ticket_store;

pub use mock_ticket_store::FailingTicketStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{Duration, Utc};

    use crate::config::SlaConfig;
    use crate::ticket::{
        CreateTicketRequest, Priority, Ticket, TicketStatus, TicketStore, TicketUpdate,
    };

    /// A ticket request with reasonable defaults.
    pub fn ticket_request(title: &str, priority: Priority) -> CreateTicketRequest {
        CreateTicketRequest::new(title, priority, "helpdesk@example.com")
            .with_description(format!("{} (reported by phone)", title))
            .with_sla(&SlaConfig::default())
    }

    /// Create `count` tickets and move them to `status`.
    ///
    /// Creation times are spaced one minute apart, newest last, so list order
    /// is deterministic. Returns the tickets in creation order.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects a write.
    pub fn seed_tickets(store: &dyn TicketStore, count: usize, status: TicketStatus) -> Vec<Ticket> {
        let start = Utc::now() - Duration::minutes(count as i64 + 1);
        (0..count)
            .map(|i| {
                let priority = Priority::ALL[i % Priority::ALL.len()];
                let request = ticket_request(&format!("Ticket {}", i + 1), priority)
                    .with_created_at(start + Duration::minutes(i as i64));
                let ticket = store.create(request).expect("seed ticket");
                if status == TicketStatus::Open {
                    return ticket;
                }
                store
                    .update(
                        &ticket.id,
                        TicketUpdate {
                            status: Some(status),
                            ..Default::default()
                        },
                    )
                    .expect("seed ticket status")
            })
            .collect()
    }
}
