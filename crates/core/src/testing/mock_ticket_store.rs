//! Ticket store that fails every call.

use crate::ticket::{
    CreateTicketRequest, Ticket, TicketError, TicketFilter, TicketStats, TicketStore, TicketUpdate,
};

/// Ticket store whose every operation returns [`TicketError::Database`].
///
/// Used to check that storage failures surface as generic failures with no
/// partial results.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingTicketStore;

impl FailingTicketStore {
    fn error() -> TicketError {
        TicketError::Database("database is locked".to_string())
    }
}

impl TicketStore for FailingTicketStore {
    fn create(&self, _request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        Err(Self::error())
    }

    fn get(&self, _id: &str) -> Result<Option<Ticket>, TicketError> {
        Err(Self::error())
    }

    fn list(&self, _filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        Err(Self::error())
    }

    fn count(&self, _filter: &TicketFilter) -> Result<i64, TicketError> {
        Err(Self::error())
    }

    fn update(&self, _id: &str, _update: TicketUpdate) -> Result<Ticket, TicketError> {
        Err(Self::error())
    }

    fn stats(&self) -> Result<TicketStats, TicketError> {
        Err(Self::error())
    }
}
