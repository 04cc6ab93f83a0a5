use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{audit, auth, handlers, teams, tickets, users};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Reachable without credentials
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/config", get(handlers::get_config))
        // Session
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Tickets
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/stats", get(tickets::get_stats))
        .route(
            "/tickets/{id}",
            get(tickets::get_ticket).put(tickets::update_ticket),
        )
        .route("/tickets/{id}/transitions", get(tickets::get_transitions))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Teams
        .route("/teams", get(teams::list_teams).post(teams::create_team))
        .route(
            "/teams/{id}",
            get(teams::get_team)
                .put(teams::update_team)
                .delete(teams::delete_team),
        )
        .route("/teams/{id}/members", post(teams::add_member))
        .route(
            "/teams/{id}/members/{member_id}",
            put(teams::update_member).delete(teams::remove_member),
        )
        // Audit
        .route("/audit", get(audit::query_audit))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = public_routes
        .merge(protected_routes)
        .with_state(Arc::clone(&state));

    let mut router = Router::new().nest("/api/v1", api_routes);

    // Serve dashboard with SPA fallback
    if let Some(dashboard_dir) = state.dashboard_dir() {
        let index_path = dashboard_dir.join("index.html");
        let serve_dir = ServeDir::new(dashboard_dir).fallback(ServeFile::new(index_path));
        router = router.fallback_service(serve_dir);
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
