//! Route definitions

use axum::{
    Router,
    routing::{get, post},
};

use crate::{handlers, state::AppState};

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat page
        .route("/", get(handlers::ui::index))
        // Health and status endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        // Models
        .route("/api/models", get(handlers::models::list_models))
        // Sessions
        .route("/api/sessions", post(handlers::sessions::create_session))
        .route(
            "/api/sessions/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route(
            "/api/sessions/{id}/commands",
            post(handlers::sessions::post_command),
        )
        .route(
            "/api/sessions/{id}/events",
            get(handlers::sessions::session_events),
        )
        // Attach state
        .with_state(state)
}
