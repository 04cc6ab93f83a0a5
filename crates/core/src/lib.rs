pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod team;
pub mod testing;
pub mod ticket;
pub mod user;

pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
    SessionManager,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use ticket::{
    Priority, Ticket, TicketQueryService, TicketStatus, TicketStore, TicketWorkflow,
};
