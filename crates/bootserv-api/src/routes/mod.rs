//! # Route Table
//!
//! | Method | Path                | Handler                      |
//! |--------|---------------------|------------------------------|
//! | `PUT`  | `/`                 | [`rc::upload`]               |
//! | `POST` | `/`                 | [`webhook::receive`]         |
//! | `GET`  | `/bootstrap.signed` | [`rc::bootstrap`]            |
//! | `GET`  | `/ping`             | [`ping`]                     |
//! | `GET`  | `/<artifact>`       | [`artifact::serve`]          |
//!
//! Anything else gets [`unmatched`]: `400 invalid path` for reads,
//! `404 bad url` for writes, `405 method not allowed` otherwise.

pub mod artifact;
pub mod rc;
pub mod webhook;

use axum::http::Method;
use axum::routing::{get, put};
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

/// All routes, with the artifact served at `/<artifact_name>`.
pub fn router(artifact_name: &str) -> Router<AppState> {
    Router::new()
        .route("/", put(rc::upload).post(webhook::receive))
        .route("/bootstrap.signed", get(rc::bootstrap))
        .route("/ping", get(ping))
        .route(&format!("/{artifact_name}"), get(artifact::serve))
        .fallback(unmatched)
        .method_not_allowed_fallback(unmatched)
}

/// Liveness check.
pub async fn ping() -> &'static str {
    "pong"
}

/// Answer for any request no route accepts.
pub async fn unmatched(method: Method) -> AppError {
    match method {
        Method::GET | Method::HEAD => AppError::BadRequest("invalid path".into()),
        Method::POST | Method::PUT => AppError::NotFound("bad url".into()),
        _ => AppError::MethodNotAllowed,
    }
}
