//! # Webhook Coordinator
//!
//! Reacts to CI pipeline events. A request is authenticated against the
//! [`AccessToken`], filtered by event name, and its builds are scanned for
//! the newest finished job strictly newer than the cached artifact. That
//! job's artifact is fetched through an [`ArtifactFetcher`] and installed
//! into the [`ArtifactCache`].
//!
//! ## Outcomes
//!
//! | Outcome            | HTTP |
//! |--------------------|------|
//! | `Unauthorized`     | 403  |
//! | `UnknownEvent`     | 404  |
//! | `MalformedPayload` | 400  |
//! | `NoNewBuild`       | 200  |
//! | `Refreshed`        | 200  |
//! | `RefreshFailed`    | 500  |
//!
//! ## Build Selection
//!
//! A build is a candidate when it has a parsable `finished_at`, its
//! `status` is absent or `success` (failed jobs publish no artifact), and
//! [`ArtifactCache::is_newer`] says the cached copy is not already at least
//! that recent. The newest candidate wins; ties keep the first listed.
//! Entries of `builds` that do not parse as a build (no numeric `id`, a
//! non-string field) are dropped on their own instead of failing the
//! whole payload.
//!
//! Refreshes are serialized: two concurrent webhooks cannot interleave
//! their select-then-replace sequences.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};

use crate::artifact::ArtifactCache;
use crate::error::FetchError;
use crate::timestamp::parse_ci_timestamp;
use crate::token::AccessToken;

/// Event name of GitLab pipeline notifications, matched case-insensitively.
pub const PIPELINE_HOOK: &str = "Pipeline Hook";

// -- Payload ------------------------------------------------------------------

/// GitLab "Pipeline Hook" payload. Only the fields used here are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineEvent {
    #[serde(default)]
    pub object_kind: Option<String>,
    #[serde(default)]
    pub project: Option<Project>,
    #[serde(deserialize_with = "usable_builds")]
    pub builds: Vec<Build>,
}

/// Keep the entries that parse as a [`Build`], dropping the rest.
fn usable_builds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Build>, D::Error> {
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Build>(entry) {
            Ok(build) => Some(build),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unusable build entry");
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// One CI job of the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Build {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

/// The build chosen for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRef {
    pub job_id: u64,
    pub name: Option<String>,
    pub project_id: Option<u64>,
    pub project_url: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Pick the newest successful build the cache does not already cover.
///
/// `cached_is_current(finished_at)` answers whether the cached artifact is
/// at least as recent as a build finished at that time; the coordinator
/// backs it with [`ArtifactCache::is_newer`]. It is only consulted for
/// builds with a parsable `finished_at` and a `status` that is absent or
/// `success`. On equal finish times the first build listed wins.
pub fn select_build<E>(
    event: &PipelineEvent,
    mut cached_is_current: impl FnMut(DateTime<Utc>) -> Result<bool, E>,
) -> Result<Option<BuildRef>, E> {
    let mut best: Option<(&Build, DateTime<Utc>)> = None;
    for build in &event.builds {
        let Some(finished_at) = build.finished_at.as_deref().and_then(parse_ci_timestamp) else {
            continue;
        };
        if build
            .status
            .as_deref()
            .is_some_and(|s| !s.eq_ignore_ascii_case("success"))
        {
            continue;
        }
        if best.is_some_and(|(_, t)| finished_at <= t) {
            continue;
        }
        if cached_is_current(finished_at)? {
            continue;
        }
        best = Some((build, finished_at));
    }

    Ok(best.map(|(build, finished_at)| BuildRef {
        job_id: build.id,
        name: build.name.clone(),
        project_id: event.project.as_ref().and_then(|p| p.id),
        project_url: event.project.as_ref().and_then(|p| p.web_url.clone()),
        finished_at,
    }))
}

// -- Fetcher ------------------------------------------------------------------

/// Retrieves the artifact bytes of a selected build.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, build: &BuildRef) -> Result<Vec<u8>, FetchError>;
}

// -- Outcome ------------------------------------------------------------------

/// What a webhook request led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Unauthorized,
    UnknownEvent,
    MalformedPayload(String),
    NoNewBuild,
    Refreshed { build_id: u64 },
    RefreshFailed(String),
}

impl WebhookOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 403,
            Self::UnknownEvent => 404,
            Self::MalformedPayload(_) => 400,
            Self::NoNewBuild | Self::Refreshed { .. } => 200,
            Self::RefreshFailed(_) => 500,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::UnknownEvent => "unknown_event",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::NoNewBuild => "no_new_build",
            Self::Refreshed { .. } => "refreshed",
            Self::RefreshFailed(_) => "refresh_failed",
        }
    }
}

// -- Coordinator --------------------------------------------------------------

/// Ties the token guard, artifact cache and fetcher together.
pub struct WebhookCoordinator {
    token: AccessToken,
    cache: Arc<ArtifactCache>,
    fetcher: Arc<dyn ArtifactFetcher>,
    refresh: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for WebhookCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookCoordinator")
            .field("token", &self.token)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl WebhookCoordinator {
    pub fn new(
        token: AccessToken,
        cache: Arc<ArtifactCache>,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        Self {
            token,
            cache,
            fetcher,
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Process one webhook delivery.
    ///
    /// The payload is not parsed unless the credential verifies.
    pub async fn handle(
        &self,
        credential: Option<&str>,
        event_name: Option<&str>,
        payload: &[u8],
    ) -> WebhookOutcome {
        let outcome = self.dispatch(credential, event_name, payload).await;
        match &outcome {
            WebhookOutcome::RefreshFailed(reason) => {
                tracing::error!(outcome = outcome.label(), %reason, "artifact refresh failed");
            }
            WebhookOutcome::Refreshed { build_id } => {
                tracing::info!(outcome = outcome.label(), build_id, "artifact refreshed");
            }
            _ => tracing::info!(outcome = outcome.label(), "webhook handled"),
        }
        outcome
    }

    async fn dispatch(
        &self,
        credential: Option<&str>,
        event_name: Option<&str>,
        payload: &[u8],
    ) -> WebhookOutcome {
        if !self.token.verify(credential) {
            return WebhookOutcome::Unauthorized;
        }
        if !event_name.is_some_and(|name| name.trim().eq_ignore_ascii_case(PIPELINE_HOOK)) {
            return WebhookOutcome::UnknownEvent;
        }
        let event: PipelineEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => return WebhookOutcome::MalformedPayload(e.to_string()),
        };

        let _guard = self.refresh.lock().await;

        let cache = Arc::clone(&self.cache);
        let selected =
            tokio::task::spawn_blocking(move || select_build(&event, |t| cache.is_newer(t))).await;
        let build = match selected {
            Ok(Ok(Some(build))) => build,
            Ok(Ok(None)) => return WebhookOutcome::NoNewBuild,
            Ok(Err(e)) => return WebhookOutcome::RefreshFailed(e.to_string()),
            Err(e) => return WebhookOutcome::RefreshFailed(e.to_string()),
        };
        tracing::info!(
            build_id = build.job_id,
            finished_at = %build.finished_at,
            "fetching artifact for newer build"
        );

        let content = match self.fetcher.fetch(&build).await {
            Ok(content) => content,
            Err(e) => return WebhookOutcome::RefreshFailed(e.to_string()),
        };
        let digest = hex::encode(Sha256::digest(&content));

        let cache = Arc::clone(&self.cache);
        match tokio::task::spawn_blocking(move || cache.replace(&content)).await {
            Ok(Ok(())) => {
                tracing::info!(build_id = build.job_id, sha256 = %digest, "artifact installed");
                WebhookOutcome::Refreshed {
                    build_id: build.job_id,
                }
            }
            Ok(Err(e)) => WebhookOutcome::RefreshFailed(e.to_string()),
            Err(e) => WebhookOutcome::RefreshFailed(e.to_string()),
        }
    }
}
