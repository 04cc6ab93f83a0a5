use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - An API key is present when the api_key method is selected
/// - The bootstrap admin, if any, has a username and password
/// - Page sizes are positive and the default fits under the maximum
/// - SLA targets are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_ref().is_none_or(|k| k.is_empty())
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when using the api_key method".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::Session && config.auth.session_ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "auth.session_ttl_secs cannot be 0".to_string(),
        ));
    }

    if let Some(admin) = &config.auth.bootstrap_admin {
        if admin.username.trim().is_empty() || admin.password.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.bootstrap_admin needs a username and a password".to_string(),
            ));
        }
    }

    let query = &config.query;
    if query.default_page_size == 0 || query.max_page_size == 0 {
        return Err(ConfigError::ValidationError(
            "query page sizes must be at least 1".to_string(),
        ));
    }
    if query.default_page_size > query.max_page_size {
        return Err(ConfigError::ValidationError(format!(
            "query.default_page_size ({}) exceeds query.max_page_size ({})",
            query.default_page_size, query.max_page_size
        )));
    }

    let sla = &config.sla;
    if [sla.critical_hours, sla.high_hours, sla.medium_hours, sla.low_hours].contains(&0) {
        return Err(ConfigError::ValidationError(
            "sla targets must be at least 1 hour".to_string(),
        ));
    }

    Ok(())
}
