//! Conditional download of the cached artifact.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bootserv_core::{format_http_date, ArtifactServe};

use crate::error::AppError;
use crate::state::AppState;

/// `GET /<artifact>`: 200 with content, or 304 when the client copy is
/// current according to `If-Modified-Since`.
pub async fn serve(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cache = Arc::clone(&state.artifacts);
    let served = tokio::task::spawn_blocking(move || cache.serve(since.as_deref())).await??;

    let last_modified = format_http_date(served.last_modified());
    let response = match served {
        ArtifactServe::NotModified { .. } => {
            (StatusCode::NOT_MODIFIED, [(header::LAST_MODIFIED, last_modified)]).into_response()
        }
        ArtifactServe::Fresh { content, .. } => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::LAST_MODIFIED, last_modified),
                (header::CONTENT_LENGTH, content.len().to_string()),
            ],
            content,
        )
            .into_response(),
    };
    Ok(response)
}
