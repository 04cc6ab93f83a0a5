use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::ticket::Priority;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub sla: SlaConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with the built dashboard frontend. Not served when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dashboard_dir: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Required when `method = "api_key"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Lifetime of a login session in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    /// Admin account created at startup when no users exist yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Credentials for the first admin account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapAdmin {
    pub username: String,
    #[serde(default = "default_admin_email")]
    pub email: String,
    pub password: String,
}

fn default_admin_email() -> String {
    "admin@localhost".to_string()
}

fn default_session_ttl() -> u64 {
    8 * 60 * 60
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
    Session,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
            AuthMethod::Session => "session",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("daemonview.db")
}

/// Ticket listing configuration
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Page size used when the client sends none (or garbage).
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Larger requested page sizes are clamped to this.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    100
}

/// Status workflow configuration
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Reject status changes that are not in the transition table.
    #[serde(default = "default_enforce_transitions")]
    pub enforce_transitions: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enforce_transitions: default_enforce_transitions(),
        }
    }
}

fn default_enforce_transitions() -> bool {
    true
}

/// Resolution targets per priority, in hours.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct SlaConfig {
    #[serde(default = "default_critical_hours")]
    pub critical_hours: u32,
    #[serde(default = "default_high_hours")]
    pub high_hours: u32,
    #[serde(default = "default_medium_hours")]
    pub medium_hours: u32,
    #[serde(default = "default_low_hours")]
    pub low_hours: u32,
}

impl SlaConfig {
    /// Resolution target for a ticket of the given priority.
    pub fn hours_for(&self, priority: Priority) -> u32 {
        match priority {
            Priority::Critical => self.critical_hours,
            Priority::High => self.high_hours,
            Priority::Medium => self.medium_hours,
            Priority::Low => self.low_hours,
        }
    }
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            critical_hours: default_critical_hours(),
            high_hours: default_high_hours(),
            medium_hours: default_medium_hours(),
            low_hours: default_low_hours(),
        }
    }
}

fn default_critical_hours() -> u32 {
    4
}

fn default_high_hours() -> u32 {
    8
}

fn default_medium_hours() -> u32 {
    24
}

fn default_low_hours() -> u32 {
    72
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub query: QueryConfig,
    pub workflow: WorkflowConfig,
    pub sla: SlaConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
    pub session_ttl_secs: u64,
    /// Username only; the password never leaves the config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_admin: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                session_ttl_secs: config.auth.session_ttl_secs,
                bootstrap_admin: config
                    .auth
                    .bootstrap_admin
                    .as_ref()
                    .map(|admin| admin.username.clone()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            query: config.query,
            workflow: config.workflow,
            sla: config.sla,
        }
    }
}
