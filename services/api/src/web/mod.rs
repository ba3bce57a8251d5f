pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    routing::{get, post, put},
    Router,
};
use rest::{
    activate_session_handler, clear_sessions_handler, create_session_handler, feedback_handler,
    get_session_handler, list_sessions_handler, profile_handler, quick_actions_handler,
    send_to_active_handler, send_to_session_handler,
};
use state::AppState;
use std::sync::Arc;

/// Wires every REST handler onto its route. CORS and Swagger UI are layered on by the binary.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/sessions",
            get(list_sessions_handler)
                .post(create_session_handler)
                .delete(clear_sessions_handler),
        )
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/activate", post(activate_session_handler))
        .route("/sessions/{id}/messages", post(send_to_session_handler))
        .route(
            "/sessions/{id}/messages/{index}/feedback",
            put(feedback_handler),
        )
        .route("/messages", post(send_to_active_handler))
        .route("/profile", get(profile_handler))
        .route("/quick-actions", get(quick_actions_handler))
        .with_state(app_state)
}
