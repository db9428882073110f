//! # bootserv-core: Overlay Network Bootstrap Server
//!
//! The pieces of a bootstrap endpoint that do not depend on HTTP:
//!
//! - [`rc`]: the signed router contact format and the [`RcValidator`]
//!   contract with its Ed25519 implementation.
//! - [`store`]: the directory of validated router contacts, one per
//!   identity, with random selection and pruning.
//! - [`artifact`]: the cached build artifact and its conditional read.
//! - [`token`]: the shared secret guarding the CI webhook.
//! - [`webhook`]: CI pipeline event handling and artifact refresh.
//!
//! ## Crate Policy
//!
//! - No `panic!()` or `.unwrap()` outside tests.
//! - Every file write goes through a temporary file and an atomic rename.
//! - Validation failures and I/O failures are never reported the same way.

pub mod artifact;
pub mod bencode;
pub mod error;
pub mod fsutil;
pub mod layout;
pub mod lock;
pub mod rc;
pub mod store;
pub mod timestamp;
pub mod token;
pub mod webhook;

// Re-export primary types for ergonomic imports.
pub use artifact::{ArtifactCache, ArtifactServe};
pub use error::{ArtifactError, BencodeError, FetchError, RcError, StoreError, TokenError};
pub use layout::{DataLayout, DEFAULT_ROOT};
pub use rc::{
    RcValidator, RouterContact, RouterContactBuilder, RouterId, SignedRcValidator,
    ValidationPolicy, MAX_RC_SIZE,
};
pub use store::{PruneReport, RcStore};
pub use timestamp::{format_http_date, parse_ci_timestamp, parse_http_date};
pub use token::AccessToken;
pub use webhook::{
    ArtifactFetcher, BuildRef, PipelineEvent, WebhookCoordinator, WebhookOutcome, PIPELINE_HOOK,
};
