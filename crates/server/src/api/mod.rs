pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod teams;
pub mod tickets;
pub mod users;

pub use error::ApiError;
pub use routes::create_router;
