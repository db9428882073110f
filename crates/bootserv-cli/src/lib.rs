//! # bootserv-cli: Operator CLI for the Bootstrap Server
//!
//! Provides the `bootserv` command-line interface.
//!
//! ## Subcommands
//!
//! - `bootserv prune`: one maintenance pass over the RC store. Meant to be
//!   run from a timer; refuses to overlap with another pass.
//! - `bootserv check`: decode and verify an RC file, printing its identity
//!   or the reason it is rejected.
//! - `bootserv keygen` / `bootserv make-rc`: create an identity key and
//!   mint signed RCs with it.
//!
//! ```bash
//! bootserv prune --root /srv/lokinet
//! bootserv check nodedb/4f0c...e1
//! bootserv make-rc --secret-key-hex $(cat router.key) --address 203.0.113.7:1090 --out self.signed
//! ```
//!
//! Handlers return the process exit code: 0 on success, 1 when the
//! operation ran but its verdict is negative.

pub mod check;
pub mod prune;
pub mod rc;

use std::time::Duration;

use anyhow::{anyhow, Result};
use bootserv_core::ValidationPolicy;

/// Validation policy with `lifetime_secs` and the default clock skew.
pub fn policy_with_lifetime(lifetime_secs: u64) -> Result<ValidationPolicy> {
    let lifetime = i64::try_from(lifetime_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| anyhow!("RC lifetime of {lifetime_secs}s is out of range"))?;
    Ok(ValidationPolicy {
        lifetime,
        ..ValidationPolicy::default()
    })
}

/// Default RC lifetime, shared with the server.
pub const DEFAULT_RC_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lifetime_matches_core_default() {
        let policy = policy_with_lifetime(DEFAULT_RC_LIFETIME.as_secs()).unwrap();
        assert_eq!(policy, ValidationPolicy::default());
    }

    #[test]
    fn out_of_range_lifetime() {
        assert!(policy_with_lifetime(u64::MAX).is_err());
    }
}
