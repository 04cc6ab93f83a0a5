//! Dashboard accounts.

mod bootstrap;
mod password;
mod sqlite_store;
mod store;
mod types;

pub use bootstrap::ensure_bootstrap_admin;
pub use password::{hash_password, verify_password};
pub use sqlite_store::SqliteUserStore;
pub use store::{UserError, UserStore};
pub use types::{CreateUserRequest, UnknownRole, UpdateUserRequest, User, UserRole};
