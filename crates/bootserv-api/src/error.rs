//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Bodies are short `text/plain` messages, the form bootstrap clients
//! already expect. Internal details are logged, never returned.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bootserv_core::{ArtifactError, StoreError};
use thiserror::Error;

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request could not be acted on (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Credential missing or wrong (403). The body gives no hints.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Method not served on any path (405).
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Upload larger than any valid record (413).
    #[error("payload too large: {size} bytes, limit {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the client.
    fn body(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Forbidden => "forbidden".to_string(),
            Self::MethodNotAllowed => "method not allowed".to_string(),
            Self::PayloadTooLarge { .. } => "payload too large".to_string(),
            Self::Internal(_) => "internal error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body(),
        )
            .into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ArtifactError> for AppError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Missing { .. } => Self::NotFound(err.to_string()),
            ArtifactError::Io { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn client_errors_return_their_message() {
        assert_eq!(
            render(AppError::BadRequest("bad rc".into())).await,
            (StatusCode::BAD_REQUEST, "bad rc".into())
        );
        assert_eq!(
            render(AppError::NotFound("no RCs".into())).await,
            (StatusCode::NOT_FOUND, "no RCs".into())
        );
        assert_eq!(
            render(AppError::MethodNotAllowed).await,
            (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".into())
        );
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let (status, body) = render(AppError::Internal("disk on fire at /srv".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("/srv"));
    }

    #[test]
    fn missing_artifact_maps_to_not_found() {
        let err: AppError = ArtifactError::Missing {
            name: "lokinet".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.body(), "lokinet not available");
    }

    #[test]
    fn store_io_maps_to_internal() {
        let err: AppError = StoreError::PruneInProgress("/tmp/.prune.lock".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
