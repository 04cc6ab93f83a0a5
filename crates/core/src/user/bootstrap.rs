use super::{CreateUserRequest, User, UserError, UserRole, UserStore};
use crate::config::BootstrapAdmin;

/// Create the configured admin account if the store has no users yet.
///
/// Returns the created user, or `None` when accounts already exist.
pub fn ensure_bootstrap_admin(
    store: &dyn UserStore,
    admin: &BootstrapAdmin,
) -> Result<Option<User>, UserError> {
    if !store.list()?.is_empty() {
        return Ok(None);
    }

    let user = store.create(
        CreateUserRequest::new(&admin.username, &admin.email, &admin.password)
            .with_role(UserRole::Admin),
    )?;
    tracing::info!(username = %user.username, "Bootstrap admin created");
    Ok(Some(user))
}
