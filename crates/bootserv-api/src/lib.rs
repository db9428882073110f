//! # bootserv-api: HTTP Front End of the Bootstrap Server
//!
//! Serves router contacts to joining nodes, accepts uploads of new ones,
//! hands out the cached client artifact with conditional GET, and receives
//! the CI webhook that refreshes that artifact.
//!
//! See [`routes`] for the route table. All error bodies are `text/plain`.
//!
//! ## Middleware Stack
//!
//! ```text
//! TraceLayer → Handler
//! ```
//!
//! Filesystem work runs on the blocking pool; handlers never hold a lock
//! across an `.await`.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod fetch;
pub mod maintenance;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    routes::router(state.artifact_name())
        .layer(middleware::tracing_layer::layer())
        .with_state(state)
}
