//! Login sessions.
//!
//! A session is an opaque random token mapped to a user id with an expiry.
//! Sessions live in memory only, a restart logs everyone out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::user::{User, UserStore};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "daemonview_session";

// One year
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// An issued session.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues, resolves and revokes session tokens.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl_secs = ttl_secs.min(MAX_TTL_SECS) as i64;
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, AuthError> {
        self.sessions
            .lock()
            .map_err(|_| AuthError::ServiceUnavailable("session table lock poisoned".to_string()))
    }

    /// Check credentials and issue a session for the user.
    pub fn login(
        &self,
        users: &dyn UserStore,
        username: &str,
        password: &str,
    ) -> Result<(Session, User), AuthError> {
        let user = users
            .verify_credentials(username, password)
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?
            .ok_or_else(|| {
                AuthError::InvalidCredentials("Invalid username or password".to_string())
            })?;

        let session = self.issue(&user)?;
        Ok((session, user))
    }

    /// Issue a new session for `user`.
    pub fn issue(&self, user: &User) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session {
            token: uuid::Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.lock()?;
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.insert(session.token.clone(), session.clone());

        tracing::debug!(user_id = user.id, "Session issued");
        Ok(session)
    }

    /// Look up a live session. Expired sessions are removed.
    pub fn resolve(&self, token: &str) -> Result<Session, AuthError> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get(token)
            .cloned()
            .ok_or(AuthError::NotAuthenticated)?;

        if session.is_expired(Utc::now()) {
            sessions.remove(token);
            return Err(AuthError::SessionExpired);
        }

        Ok(session)
    }

    /// Revoke a session. Returns false if it did not exist.
    pub fn revoke(&self, token: &str) -> bool {
        match self.lock() {
            Ok(mut sessions) => sessions.remove(token).is_some(),
            Err(_) => false,
        }
    }

    /// Drop every session of a user, e.g. when the account is deleted.
    pub fn revoke_user(&self, user_id: i64) -> usize {
        match self.lock() {
            Ok(mut sessions) => {
                let before = sessions.len();
                sessions.retain(|_, s| s.user_id != user_id);
                before - sessions.len()
            }
            Err(_) => 0,
        }
    }

    /// Remove expired sessions, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        match self.lock() {
            Ok(mut sessions) => {
                let before = sessions.len();
                sessions.retain(|_, s| !s.is_expired(now));
                before - sessions.len()
            }
            Err(_) => 0,
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// Authenticator for session tokens presented as a bearer token or cookie.
pub struct SessionAuthenticator {
    sessions: Arc<SessionManager>,
    users: Arc<dyn UserStore>,
}

impl SessionAuthenticator {
    pub fn new(sessions: Arc<SessionManager>, users: Arc<dyn UserStore>) -> Self {
        Self { sessions, users }
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = request
            .bearer_token()
            .or_else(|| request.cookie(SESSION_COOKIE))
            .ok_or(AuthError::NotAuthenticated)?;

        let session = self.sessions.resolve(token)?;

        // Role changes and deletions take effect on the next request
        let user = self
            .users
            .get(session.user_id)
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?
            .ok_or_else(|| {
                self.sessions.revoke(token);
                AuthError::NotAuthenticated
            })?;

        Ok(Identity::for_user(&user))
    }

    fn method_name(&self) -> &'static str {
        "session"
    }
}
