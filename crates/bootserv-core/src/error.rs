//! # Error Hierarchy
//!
//! Structured error types for the bootstrap server, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Validation failures and I/O failures never share a variant. An upload
//! that fails validation is answered with a boolean rejection, while a disk
//! error surfaces as [`StoreError::Io`] and becomes a 5xx at the transport.

use std::path::PathBuf;

use thiserror::Error;

/// Low-level bencode decoding failure, with the byte offset where the
/// decoder gave up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("bencode error at offset {offset}: {reason}")]
pub struct BencodeError {
    /// Offset into the input where decoding failed.
    pub offset: usize,
    /// What the decoder expected or found.
    pub reason: String,
}

/// Reasons a router contact is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RcError {
    /// The encoded record exceeds the maximum accepted size.
    #[error("router contact is {size} bytes, maximum is {max}")]
    Oversized {
        /// Size of the submitted record.
        size: usize,
        /// Maximum accepted size.
        max: usize,
    },

    /// The record is not well-formed bencode.
    #[error("malformed encoding: {0}")]
    Malformed(#[from] BencodeError),

    /// The top-level value is not a dictionary.
    #[error("router contact must be a dictionary")]
    NotADictionary,

    /// A required field is absent or has the wrong bencode type.
    #[error("missing or mistyped field {0:?}")]
    MissingField(&'static str),

    /// A fixed-size byte field has the wrong length.
    #[error("field {field:?} must be {expected} bytes, got {actual}")]
    FieldLength {
        /// Field key.
        field: &'static str,
        /// Required length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },

    /// The record declares a format version this server does not accept.
    #[error("unsupported router contact version {0}")]
    UnsupportedVersion(i64),

    /// The identity key is not a valid Ed25519 point.
    #[error("invalid identity key: {0}")]
    InvalidPublicKey(String),

    /// The signature does not verify against the identity key.
    #[error("signature verification failed")]
    BadSignature,

    /// The record is older than the accepted lifetime.
    #[error("router contact expired {age_secs}s after signing")]
    Expired {
        /// Seconds elapsed since the record was signed.
        age_secs: i64,
    },

    /// The record claims a signing time too far in the future.
    #[error("router contact is timestamped {ahead_secs}s in the future")]
    FromTheFuture {
        /// Seconds between now and the claimed signing time.
        ahead_secs: i64,
    },

    /// The signing timestamp does not fit a calendar date.
    #[error("invalid timestamp {0}")]
    InvalidTimestamp(i64),
}

/// Errors from the RC store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation on a store path failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Another prune pass holds the maintenance lock.
    #[error("prune already running (lock held on {0})")]
    PruneInProgress(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the artifact cache.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// No artifact has been installed yet.
    #[error("{name} not available")]
    Missing {
        /// Artifact name.
        name: String,
    },

    /// Filesystem operation on the artifact failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors loading the access token.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The token file exists but could not be read.
    #[error("failed to read token file {path}: {source}")]
    Io {
        /// Token file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors retrieving a build artifact from CI.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The download URL could not be assembled.
    #[error("cannot build artifact URL: {0}")]
    Url(String),

    /// Network or protocol failure talking to CI.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Transport error description.
        message: String,
    },

    /// CI answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// CI answered with an empty body.
    #[error("{url} returned an empty artifact")]
    Empty {
        /// Requested URL.
        url: String,
    },

    /// The artifact is larger than the configured maximum.
    #[error("{url} returned more than {limit} bytes")]
    TooLarge {
        /// Requested URL.
        url: String,
        /// Configured maximum, in bytes.
        limit: u64,
    },
}
