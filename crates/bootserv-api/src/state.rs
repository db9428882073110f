//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Every component is behind an `Arc`, so the
//! state clones cheaply per request.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bootserv_core::{ArtifactCache, RcStore, WebhookCoordinator, DEFAULT_ROOT};

/// Default URL pattern for downloading a job's artifact from GitLab.
pub const DEFAULT_ARTIFACT_URL_TEMPLATE: &str =
    "{project_url}/-/jobs/{job_id}/artifacts/raw/{artifact}";

/// Default cap on a downloaded artifact: 256 MiB.
pub const DEFAULT_MAX_ARTIFACT_SIZE: u64 = 256 * 1024 * 1024;

/// Paths the artifact may not shadow.
pub const RESERVED_PATHS: &[&str] = &["", "ping", "bootstrap.signed"];

/// Server configuration.
///
/// Custom `Debug` redacts the CI API token to prevent credential leakage in
/// logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Data root holding `token`, `nodedb/` and `bin/`.
    pub root: PathBuf,
    /// Address to bind the HTTP server to.
    pub bind: IpAddr,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// File name of the cached artifact, also its URL path.
    pub artifact_name: String,
    /// Download URL pattern with `{project_url}`, `{project_id}`,
    /// `{job_id}` and `{artifact}` placeholders.
    pub artifact_url_template: String,
    /// Token sent to CI as `PRIVATE-TOKEN` when downloading artifacts.
    pub ci_api_token: Option<String>,
    pub fetch_timeout: Duration,
    /// Largest artifact download accepted, in bytes.
    pub max_artifact_size: u64,
    /// Period of the in-process prune task. `None` leaves pruning to an
    /// external timer.
    pub prune_interval: Option<Duration>,
    /// How long a router contact stays valid after signing.
    pub rc_lifetime: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("root", &self.root)
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("artifact_name", &self.artifact_name)
            .field("artifact_url_template", &self.artifact_url_template)
            .field(
                "ci_api_token",
                &self.ci_api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("fetch_timeout", &self.fetch_timeout)
            .field("max_artifact_size", &self.max_artifact_size)
            .field("prune_interval", &self.prune_interval)
            .field("rc_lifetime", &self.rc_lifetime)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            artifact_name: "lokinet".to_string(),
            artifact_url_template: DEFAULT_ARTIFACT_URL_TEMPLATE.to_string(),
            ci_api_token: None,
            fetch_timeout: Duration::from_secs(120),
            max_artifact_size: DEFAULT_MAX_ARTIFACT_SIZE,
            prune_interval: None,
            rc_lifetime: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Arc<RcStore>,
    pub artifacts: Arc<ArtifactCache>,
    pub webhook: Arc<WebhookCoordinator>,
}

impl AppState {
    /// Assemble state from already-opened components. The coordinator must
    /// wrap the same cache that is served.
    pub fn new(store: Arc<RcStore>, webhook: Arc<WebhookCoordinator>) -> Self {
        Self {
            store,
            artifacts: Arc::clone(webhook.cache()),
            webhook,
        }
    }

    pub fn artifact_name(&self) -> &str {
        self.artifacts.name()
    }
}
