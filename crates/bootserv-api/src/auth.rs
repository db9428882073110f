//! # Webhook Credentials
//!
//! GitLab sends the shared secret in `X-Gitlab-Token` and the event kind in
//! `X-Gitlab-Event`. Both are read as-is; checking them is the webhook
//! coordinator's job. A header that is not valid UTF-8 counts as absent.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

pub const GITLAB_TOKEN_HEADER: &str = "x-gitlab-token";
pub const GITLAB_EVENT_HEADER: &str = "x-gitlab-event";

/// Credential and event name presented by a webhook caller.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WebhookCredentials {
    pub token: Option<String>,
    pub event: Option<String>,
}

impl std::fmt::Debug for WebhookCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookCredentials")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("event", &self.event)
            .finish()
    }
}

impl WebhookCredentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            token: text(GITLAB_TOKEN_HEADER),
            event: text(GITLAB_EVENT_HEADER),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for WebhookCredentials {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
