//! Route definitions for the REST API.

mod activities;
mod health;
mod programs;

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/activities", get(activities::list_activities))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Program downloads
        .route("/download", get(programs::download))
        .route("/download/:file_type", get(programs::download))
        // Activity log
        .merge(authenticated)
        // Attach state
        .with_state(state)
}

pub use activities::*;
pub use health::*;
pub use programs::*;
