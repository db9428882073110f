//! # Webhook Access Token
//!
//! The CI webhook authenticates with a single shared secret read once from
//! the token file. A missing file disables the webhook: every credential
//! is refused.

use std::path::Path;

use subtle::ConstantTimeEq;

use crate::error::TokenError;

/// Shared secret guarding the webhook.
///
/// Custom `Debug` redacts the secret to prevent credential leakage in logs.
#[derive(Clone, Default)]
pub struct AccessToken {
    secret: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AccessToken {
    /// Load the secret from `path`.
    ///
    /// A missing file yields a token that refuses everything. Trailing
    /// whitespace is stripped so a file written with `echo` still matches
    /// the header value. An empty file counts as missing.
    pub fn load(path: &Path) -> Result<Self, TokenError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Self::from_secret(Some(contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no webhook token file, webhook disabled");
                Ok(Self::default())
            }
            Err(source) => Err(TokenError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_secret(secret: Option<String>) -> Self {
        let secret = secret
            .map(|s| s.trim_end().to_string())
            .filter(|s| !s.is_empty());
        Self { secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether `candidate` matches the loaded secret.
    ///
    /// Compared in constant time; a length mismatch still runs a dummy
    /// comparison.
    pub fn verify(&self, candidate: Option<&str>) -> bool {
        let (Some(expected), Some(provided)) = (self.secret.as_deref(), candidate) else {
            return false;
        };
        let expected = expected.as_bytes();
        let provided = provided.as_bytes();
        if expected.len() != provided.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        expected.ct_eq(provided).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_secret_refuses_everything() {
        let t = AccessToken::from_secret(None);
        assert!(!t.verify(Some("anything")));
        assert!(!t.verify(Some("")));
        assert!(!t.verify(None));
    }

    #[test]
    fn matching_secret_verifies() {
        let t = AccessToken::from_secret(Some("s3cret".into()));
        assert!(t.verify(Some("s3cret")));
        assert!(!t.verify(Some("s3cre")));
        assert!(!t.verify(Some("s3cret!")));
        assert!(!t.verify(None));
    }

    #[test]
    fn trailing_newline_is_ignored() {
        let t = AccessToken::from_secret(Some("s3cret\n".into()));
        assert!(t.verify(Some("s3cret")));
    }

    #[test]
    fn empty_file_counts_as_missing() {
        let t = AccessToken::from_secret(Some("\n".into()));
        assert!(!t.is_configured());
        assert!(!t.verify(Some("")));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let t = AccessToken::load(&dir.path().join("token")).unwrap();
        assert!(!t.is_configured());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "hook-secret\n").unwrap();
        let t = AccessToken::load(&path).unwrap();
        assert!(t.verify(Some("hook-secret")));
    }

    #[test]
    fn debug_redacts_secret() {
        let t = AccessToken::from_secret(Some("hook-secret".into()));
        let dbg = format!("{t:?}");
        assert!(!dbg.contains("hook-secret"));
        assert!(dbg.contains("REDACTED"));
    }
}
