//! # Server Bootstrap
//!
//! Turns an [`AppConfig`] into a ready [`AppState`].
//!
//! ## Bootstrap Sequence
//!
//! 1. **Check config**: the artifact name must be a plain file name that
//!    does not shadow another route.
//! 2. **Lay out the root**: create `<root>`, `nodedb/` and `bin/`.
//! 3. **Load the webhook token** from `<root>/token`.
//! 4. **Open the RC store** with a signature validator using the configured
//!    lifetime, and the artifact cache.
//! 5. **Wire the webhook coordinator** to the cache and the fetcher.

use std::sync::Arc;

use bootserv_core::{
    AccessToken, ArtifactCache, ArtifactError, ArtifactFetcher, DataLayout, RcStore,
    SignedRcValidator, StoreError, TokenError, ValidationPolicy, WebhookCoordinator,
};

use crate::fetch::HttpArtifactFetcher;
use crate::state::{AppConfig, AppState, RESERVED_PATHS};

// -- Error type ---------------------------------------------------------------

/// Errors during server bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Artifact name is not usable as a file name and URL path.
    #[error("invalid artifact name {0:?}")]
    InvalidArtifactName(String),

    /// RC lifetime does not fit the validator's clock arithmetic.
    #[error("RC lifetime of {0}s is out of range")]
    InvalidLifetime(u64),

    /// Data directories could not be created.
    #[error("cannot prepare data root: {0}")]
    Layout(#[from] std::io::Error),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Artifact HTTP client could not be built.
    #[error("cannot build artifact fetcher: {0}")]
    Fetcher(#[from] bootserv_core::FetchError),
}

/// Reject artifact names that are not a single path segment or that would
/// collide with a fixed route.
pub fn check_artifact_name(name: &str) -> Result<(), BootstrapError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !plain || RESERVED_PATHS.contains(&name) {
        return Err(BootstrapError::InvalidArtifactName(name.to_string()));
    }
    Ok(())
}

/// Validation policy with the configured lifetime and the default skew.
pub fn validation_policy(config: &AppConfig) -> Result<ValidationPolicy, BootstrapError> {
    let secs = config.rc_lifetime.as_secs();
    let lifetime = i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or(BootstrapError::InvalidLifetime(secs))?;
    Ok(ValidationPolicy {
        lifetime,
        ..ValidationPolicy::default()
    })
}

/// Build state with the HTTP artifact fetcher described by `config`.
pub fn bootstrap(config: &AppConfig) -> Result<AppState, BootstrapError> {
    let fetcher = HttpArtifactFetcher::from_config(config)?;
    bootstrap_with_fetcher(config, Arc::new(fetcher))
}

/// Build state around an arbitrary fetcher.
pub fn bootstrap_with_fetcher(
    config: &AppConfig,
    fetcher: Arc<dyn ArtifactFetcher>,
) -> Result<AppState, BootstrapError> {
    check_artifact_name(&config.artifact_name)?;

    let layout = DataLayout::new(&config.root);
    layout.ensure()?;

    let token = AccessToken::load(&layout.token_file())?;
    let validator = SignedRcValidator::new(validation_policy(config)?);
    let store = RcStore::open(layout.nodedb_dir(), Arc::new(validator))?;
    let cache = ArtifactCache::open(layout.bin_dir(), config.artifact_name.clone())?;

    tracing::info!(
        root = %layout.root().display(),
        artifact = %config.artifact_name,
        records = store.len(),
        webhook_enabled = token.is_configured(),
        "bootserv state ready"
    );

    let webhook = WebhookCoordinator::new(token, Arc::new(cache), fetcher);
    Ok(AppState::new(Arc::new(store), Arc::new(webhook)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn artifact_names() {
        for ok in ["lokinet", "lokinet-linux-amd64", "lokinet_0.9.tar.xz"] {
            assert!(check_artifact_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "ping", "bootstrap.signed", "..", ".hidden", "a/b", "x y", "%2e"] {
            assert!(check_artifact_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn lifetime_feeds_the_policy() {
        let config = AppConfig {
            rc_lifetime: Duration::from_secs(3600),
            ..AppConfig::default()
        };
        let policy = validation_policy(&config).unwrap();
        assert_eq!(policy.lifetime, chrono::Duration::hours(1));
        assert_eq!(policy.max_clock_skew, ValidationPolicy::default().max_clock_skew);
    }

    #[test]
    fn absurd_lifetime_is_rejected() {
        let config = AppConfig {
            rc_lifetime: Duration::from_secs(u64::MAX),
            ..AppConfig::default()
        };
        assert!(matches!(
            validation_policy(&config),
            Err(BootstrapError::InvalidLifetime(_))
        ));
    }

    #[test]
    fn bootstrap_creates_the_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            root: tmp.path().join("srv"),
            ..AppConfig::default()
        };
        let state = bootstrap(&config).unwrap();
        assert!(tmp.path().join("srv/nodedb").is_dir());
        assert!(tmp.path().join("srv/bin").is_dir());
        assert!(state.store.is_empty());
        assert_eq!(state.artifact_name(), "lokinet");
    }
}
