//! buzza-server - REST API server for buzza.
//!
//! Serves the current file set of a release line and a user's activity log.
//!
//! # Example
//!
//! ```ignore
//! use buzza_core::BuzzaConfig;
//! use buzza_server::{create_server, AppState};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BuzzaConfig::from_env().unwrap();
//!     let state = AppState::from_config(&config).unwrap();
//!     let app = create_server(state);
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_addr()).await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod auth;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedUser, Authenticator, StaticTokenAuthenticator};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{middleware as axum_middleware, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the server with all routes and middleware.
pub fn create_server(state: AppState) -> Router {
    routes::create_router(state).layer(
        ServiceBuilder::new()
            .layer(axum_middleware::from_fn(middleware::logging_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::cors_layer()),
    )
}
