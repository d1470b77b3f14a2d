//! Router configuration for the termbox server.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handler, middleware as app_middleware, state::AppState};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Create a new router with the given state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handler::health))
        .route(
            "/boxes",
            post(handler::create_box).get(handler::list_boxes),
        )
        .route("/boxes/{id}/exec", get(handler::exec_box))
        .layer(middleware::from_fn(app_middleware::logging_middleware))
        .with_state(state)
}
