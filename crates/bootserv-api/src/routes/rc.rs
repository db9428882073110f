//! Router contact upload and bootstrap download.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use bootserv_core::MAX_RC_SIZE;

use crate::error::AppError;
use crate::state::AppState;

/// `PUT /`: store an uploaded router contact if it validates.
pub async fn upload(State(state): State<AppState>, body: Bytes) -> Result<&'static str, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("empty body".into()));
    }
    if body.len() > MAX_RC_SIZE {
        return Err(AppError::PayloadTooLarge {
            size: body.len(),
            limit: MAX_RC_SIZE,
        });
    }

    let store = Arc::clone(&state.store);
    let accepted = tokio::task::spawn_blocking(move || store.insert_if_valid(&body)).await??;
    if accepted {
        Ok("rc accepted")
    } else {
        tracing::debug!("rejected router contact upload");
        Err(AppError::BadRequest("bad rc".into()))
    }
}

/// `GET /bootstrap.signed`: one stored router contact, chosen at random.
pub async fn bootstrap(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let store = Arc::clone(&state.store);
    let picked = tokio::task::spawn_blocking(move || store.pick_random()).await??;
    let bytes = picked.ok_or_else(|| AppError::NotFound("no RCs".into()))?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}
