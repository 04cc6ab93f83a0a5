//! Helpdesk tickets: storage, queries and the status workflow.

mod query;
mod sla;
mod sqlite_store;
mod store;
mod types;
mod workflow;

pub use query::{PageRequest, QueryError, TicketPage, TicketQuery, TicketQueryService};
pub use sla::{deadline_for, on_transition, SlaFields};
pub use sqlite_store::SqliteTicketStore;
pub use store::{
    CreateTicketRequest, TicketError, TicketFilter, TicketStats, TicketStore, TicketUpdate,
};
pub use types::{Priority, Ticket, TicketStatus, UnknownPriority, UnknownStatus};
pub use workflow::{TicketEdit, TicketWorkflow, TransitionCallback, Transitions, WorkflowError};
