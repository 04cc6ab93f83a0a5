mod api_key;
mod none;
mod session;
mod traits;
mod types;

pub use api_key::*;
pub use none::*;
pub use session::*;
pub use traits::*;
pub use types::*;

use std::sync::Arc;

use crate::config::{AuthConfig, AuthMethod};
use crate::user::UserStore;

/// Factory function to create authenticator from config
pub fn create_authenticator(
    config: &AuthConfig,
    sessions: Arc<SessionManager>,
    users: Arc<dyn UserStore>,
) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    AuthError::ConfigurationError(
                        "api_key must be set when using ApiKey auth method".to_string(),
                    )
                })?;
            Ok(Box::new(ApiKeyAuthenticator::new(api_key)))
        }
        AuthMethod::Session => Ok(Box::new(SessionAuthenticator::new(sessions, users))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::SqliteUserStore;

    fn config(method: AuthMethod, api_key: Option<&str>) -> AuthConfig {
        AuthConfig {
            method,
            api_key: api_key.map(String::from),
            session_ttl_secs: 60,
            bootstrap_admin: None,
        }
    }

    fn create(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
        create_authenticator(
            config,
            Arc::new(SessionManager::new(config.session_ttl_secs)),
            Arc::new(SqliteUserStore::in_memory().unwrap()),
        )
    }

    #[test]
    fn test_create_authenticator_per_method() {
        let auth = create(&config(AuthMethod::None, None)).unwrap();
        assert_eq!(auth.method_name(), "none");

        let auth = create(&config(AuthMethod::ApiKey, Some("secret-key"))).unwrap();
        assert_eq!(auth.method_name(), "api_key");

        let auth = create(&config(AuthMethod::Session, None)).unwrap();
        assert_eq!(auth.method_name(), "session");
    }

    #[test]
    fn test_create_authenticator_api_key_missing_key() {
        let result = create(&config(AuthMethod::ApiKey, None));
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));

        let result = create(&config(AuthMethod::ApiKey, Some("")));
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }
}
