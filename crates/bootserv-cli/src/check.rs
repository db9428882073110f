//! # Check Subcommand
//!
//! Decodes and verifies one RC file and explains the verdict.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bootserv_core::{RouterContact, SignedRcValidator};
use clap::Args;

/// Arguments for `bootserv check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// RC file to check.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// How long a router contact stays valid after signing, in seconds.
    #[arg(long, default_value_t = crate::DEFAULT_RC_LIFETIME.as_secs())]
    pub rc_lifetime_secs: u64,
}

/// Execute the check subcommand.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let validator = SignedRcValidator::new(crate::policy_with_lifetime(args.rc_lifetime_secs)?);

    match validator.check(&bytes) {
        Ok(id) => {
            println!("OK: {id}");
            if let Ok(rc) = RouterContact::decode(&bytes) {
                if let Some(at) = rc.updated_at() {
                    println!("  signed at: {}", at.to_rfc3339());
                }
            }
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {}: {e}", args.file.display());
            Ok(1)
        }
    }
}
