//! # Prune Subcommand
//!
//! Re-validates every stored router contact and deletes the ones that no
//! longer pass, typically because they expired.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bootserv_core::{DataLayout, RcStore, SignedRcValidator, StoreError, DEFAULT_ROOT};
use clap::Args;

/// Arguments for `bootserv prune`.
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Data root holding `nodedb/`.
    #[arg(long, env = "BOOTSERV_ROOT", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// How long a router contact stays valid after signing, in seconds.
    #[arg(long, env = "BOOTSERV_RC_LIFETIME_SECS", default_value_t = crate::DEFAULT_RC_LIFETIME.as_secs())]
    pub rc_lifetime_secs: u64,
}

/// Execute the prune subcommand.
pub fn run_prune(args: &PruneArgs) -> Result<u8> {
    let layout = DataLayout::new(&args.root);
    let validator = SignedRcValidator::new(crate::policy_with_lifetime(args.rc_lifetime_secs)?);
    let store = RcStore::open(layout.nodedb_dir(), Arc::new(validator))
        .with_context(|| format!("failed to open RC store under {}", args.root.display()))?;

    match store.prune() {
        Ok(report) if report.failed > 0 => {
            println!(
                "PARTIAL: examined {}, removed {}, {} unreadable or undeletable",
                report.examined, report.removed, report.failed
            );
            Ok(1)
        }
        Ok(report) => {
            println!(
                "OK: examined {}, removed {}, {} remaining",
                report.examined,
                report.removed,
                store.len()
            );
            Ok(0)
        }
        Err(StoreError::PruneInProgress(lock)) => {
            println!("BUSY: another prune holds {}", lock.display());
            Ok(1)
        }
        Err(e) => Err(e).context("prune failed"),
    }
}
