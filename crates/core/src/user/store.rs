//! User storage trait.

use thiserror::Error;

use super::{CreateUserRequest, UpdateUserRequest, User};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Username already taken: {0}")]
    Conflict(String),

    #[error("Invalid user data: {0}")]
    InvalidInput(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for user storage backends.
pub trait UserStore: Send + Sync {
    /// Create a user, hashing the supplied password.
    fn create(&self, request: CreateUserRequest) -> Result<User, UserError>;

    fn get(&self, id: i64) -> Result<Option<User>, UserError>;

    /// Exact, case-sensitive username lookup.
    fn find_by_username(&self, username: &str) -> Result<Option<User>, UserError>;

    /// All users ordered by id.
    fn list(&self) -> Result<Vec<User>, UserError>;

    fn update(&self, id: i64, request: UpdateUserRequest) -> Result<User, UserError>;

    /// Delete a user, clearing the assignee on any tickets they hold.
    ///
    /// Returns the number of tickets unassigned.
    fn delete(&self, id: i64) -> Result<usize, UserError>;

    /// Check a username/password pair.
    ///
    /// Returns `Ok(None)` for an unknown user or a wrong password alike.
    fn verify_credentials(&self, username: &str, password: &str)
        -> Result<Option<User>, UserError>;
}
