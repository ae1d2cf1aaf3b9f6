//! Route definitions for the Agri Advisor platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/sessions", session_routes())
}

/// Recommendation session routes
fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_session))
        .route("/resume", post(handlers::resume_session))
        .route(
            "/:session_id",
            get(handlers::get_session).delete(handlers::end_session),
        )
        .route("/:session_id/detection", post(handlers::submit_detection))
        .route("/:session_id/image", post(handlers::submit_image))
        .route("/:session_id/location", post(handlers::submit_location))
        .route("/:session_id/notes", post(handlers::submit_field_notes))
        .route("/:session_id/menu", post(handlers::submit_menu_selection))
        .route("/:session_id/question", post(handlers::submit_question))
        .route("/:session_id/input", post(handlers::submit_input))
}
