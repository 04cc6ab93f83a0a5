use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use crate::user::{User, UserRole};

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// Value of a cookie from the `cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers.get("cookie")?.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
    }

    /// Token from `Authorization: Bearer <token>`.
    pub fn bearer_token(&self) -> Option<&str> {
        let header = self.headers.get("authorization")?;
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
    }
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    pub claims: HashMap<String, serde_json::Value>,
}

impl Identity {
    /// Everyone is anonymous when authentication is disabled; anonymous acts as admin.
    pub fn anonymous() -> Self {
        Self::with_role("anonymous", "none", UserRole::Admin)
    }

    /// The holder of the configured API key.
    pub fn operator() -> Self {
        Self::with_role("api_key_user", "api_key", UserRole::Admin)
    }

    /// Identity for a logged-in dashboard user.
    pub fn for_user(user: &User) -> Self {
        let mut identity = Self::with_role(&user.username, "session", user.role);
        identity
            .claims
            .insert("uid".to_string(), serde_json::json!(user.id));
        identity
    }

    fn with_role(user_id: &str, method: &str, role: UserRole) -> Self {
        let mut claims = HashMap::new();
        claims.insert("role".to_string(), serde_json::json!(role.as_str()));
        Self {
            user_id: user_id.to_string(),
            method: method.to_string(),
            claims,
        }
    }

    pub fn role(&self) -> Option<UserRole> {
        self.claims.get("role")?.as_str()?.parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(UserRole::Admin)
    }
}
