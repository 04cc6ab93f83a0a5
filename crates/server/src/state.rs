use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use daemonview_core::{
    audit::{AuditHandle, AuditStore, SqliteAuditStore},
    team::{SqliteTeamStore, TeamStore},
    ticket::{
        SqliteTicketStore, TicketQueryService, TicketStatus, TicketStore, TicketWorkflow,
        TransitionCallback,
    },
    user::{SqliteUserStore, UserStore},
    Authenticator, Config, SanitizedConfig, SessionManager,
};

use crate::metrics::TICKET_STATUS_TRANSITIONS;

/// Storage backends shared by the API.
#[derive(Clone)]
pub struct Stores {
    pub tickets: Arc<dyn TicketStore>,
    pub users: Arc<dyn UserStore>,
    pub teams: Arc<dyn TeamStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    /// Open every SQLite store on one database file.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            tickets: Arc::new(
                SqliteTicketStore::new(path).context("Failed to create ticket store")?,
            ),
            users: Arc::new(SqliteUserStore::new(path).context("Failed to create user store")?),
            teams: Arc::new(SqliteTeamStore::new(path).context("Failed to create team store")?),
            audit: Arc::new(SqliteAuditStore::new(path).context("Failed to create audit store")?),
        })
    }
}

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    sessions: Arc<SessionManager>,
    audit: AuditHandle,
    stores: Stores,
    queries: TicketQueryService,
    workflow: TicketWorkflow,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        sessions: Arc<SessionManager>,
        audit: AuditHandle,
        stores: Stores,
    ) -> Self {
        let queries = TicketQueryService::new(Arc::clone(&stores.tickets), config.query);

        let on_transition: TransitionCallback = Arc::new(|from: TicketStatus, to: TicketStatus| {
            TICKET_STATUS_TRANSITIONS
                .with_label_values(&[from.as_str(), to.as_str()])
                .inc();
        });
        let workflow = TicketWorkflow::new(
            Arc::clone(&stores.tickets),
            Arc::clone(&stores.users),
            config.workflow,
        )
        .with_audit(audit.clone())
        .with_transition_callback(on_transition);

        Self {
            config,
            authenticator,
            sessions,
            audit,
            stores,
            queries,
            workflow,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Built dashboard frontend, if one is configured.
    pub fn dashboard_dir(&self) -> Option<&Path> {
        self.config.server.dashboard_dir.as_deref()
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.stores.audit.as_ref()
    }

    pub fn user_store(&self) -> &dyn UserStore {
        self.stores.users.as_ref()
    }

    pub fn team_store(&self) -> &dyn TeamStore {
        self.stores.teams.as_ref()
    }

    pub fn queries(&self) -> &TicketQueryService {
        &self.queries
    }

    pub fn workflow(&self) -> &TicketWorkflow {
        &self.workflow
    }
}
