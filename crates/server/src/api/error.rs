//! Mapping from domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use daemonview_core::{
    audit::AuditError,
    team::TeamError,
    ticket::{QueryError, WorkflowError},
    user::UserError,
    AuthError,
};

/// Error returned by API handlers. Serialized as `{ "error": "<message>" }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Details are logged, never sent to the client.
    #[error("{0}")]
    Internal(String),
}

/// Run blocking work (password hashing, SQLite) off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                "Internal server error".to_string()
            }
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg,
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::NotFound(_) => Self::NotFound(e.to_string()),
            QueryError::StorageFailure(detail) => Self::Internal(detail),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::InvalidRequest(_) => Self::BadRequest(e.to_string()),
            WorkflowError::NotFound(_) => Self::NotFound(e.to_string()),
            WorkflowError::InvalidTransition { .. } | WorkflowError::Conflict { .. } => {
                Self::Conflict(e.to_string())
            }
            WorkflowError::StorageFailure(detail) => Self::Internal(detail),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound(_) => Self::NotFound(e.to_string()),
            UserError::Conflict(_) => Self::Conflict(e.to_string()),
            UserError::InvalidInput(_) => Self::BadRequest(e.to_string()),
            UserError::Hashing(_) | UserError::Database(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<TeamError> for ApiError {
    fn from(e: TeamError) -> Self {
        match e {
            TeamError::TeamNotFound(_) | TeamError::MemberNotFound { .. } => {
                Self::NotFound(e.to_string())
            }
            TeamError::Conflict(_) => Self::Conflict(e.to_string()),
            TeamError::InvalidInput(_) => Self::BadRequest(e.to_string()),
            TeamError::Database(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(e: AuditError) -> Self {
        Self::Internal(format!("Failed to query audit events: {}", e))
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotAuthenticated
            | AuthError::InvalidCredentials(_)
            | AuthError::SessionExpired => Self::Unauthorized(e.to_string()),
            AuthError::ServiceUnavailable(_) | AuthError::ConfigurationError(_) => {
                Self::Internal(e.to_string())
            }
        }
    }
}
