//! # Router Contacts
//!
//! A router contact (RC) is the signed record a relay publishes so that
//! other nodes can reach it. This module decodes and verifies RCs and
//! defines the [`RcValidator`] contract the store depends on.
//!
//! ## Wire Format
//!
//! A canonical bencoded dictionary:
//!
//! | key | type | meaning |
//! |-----|------|---------|
//! | `a` | list, optional | reachability entries, opaque here |
//! | `k` | 32 bytes | Ed25519 identity key |
//! | `u` | integer | last-updated time, ms since Unix epoch |
//! | `v` | integer | format version, must be 0 |
//! | `z` | 64 bytes | Ed25519 signature |
//!
//! The signature covers the whole encoded record with the 64 signature
//! bytes replaced by zeros. Unknown keys are tolerated and covered by the
//! signature like everything else.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::bencode::{self, Value};
use crate::error::RcError;

/// Largest encoded RC accepted, in bytes.
pub const MAX_RC_SIZE: usize = 4096;

/// The only format version this server accepts.
pub const RC_VERSION: i64 = 0;

const KEY_LEN: usize = 32;
const SIG_LEN: usize = 64;

// -- RouterId -----------------------------------------------------------------

/// Identity of a router: its 32-byte Ed25519 public key.
///
/// Rendered as 64 lowercase hex characters, which is also the file name of
/// the record in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouterId([u8; KEY_LEN]);

impl RouterId {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Error parsing a [`RouterId`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid router id {0:?}: expected 64 lowercase hex characters")]
pub struct ParseRouterIdError(pub String);

impl FromStr for RouterId {
    type Err = ParseRouterIdError;

    /// Only the canonical lowercase form parses, so every stored file name
    /// maps to exactly one identity.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = s.len() == KEY_LEN * 2
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !canonical {
            return Err(ParseRouterIdError(s.to_string()));
        }
        let mut out = [0u8; KEY_LEN];
        hex::decode_to_slice(s, &mut out).map_err(|_| ParseRouterIdError(s.to_string()))?;
        Ok(Self(out))
    }
}

// -- Validation policy --------------------------------------------------------

/// Time bounds applied when verifying an RC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// How long after signing an RC stays valid.
    pub lifetime: Duration,
    /// How far in the future a signing time may be.
    pub max_clock_skew: Duration,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::hours(24),
            max_clock_skew: Duration::minutes(10),
        }
    }
}

// -- RouterContact ------------------------------------------------------------

/// A decoded router contact. Borrowing from the encoded buffer.
#[derive(Debug, Clone)]
pub struct RouterContact<'a> {
    raw: &'a [u8],
    identity: [u8; KEY_LEN],
    updated_ms: i64,
    version: i64,
    signature: [u8; SIG_LEN],
    /// Offset of the signature bytes inside `raw`.
    signature_offset: usize,
}

impl<'a> RouterContact<'a> {
    /// Decode and structurally check an RC. Does not verify the signature
    /// or time bounds; see [`RouterContact::verify`].
    pub fn decode(raw: &'a [u8]) -> Result<Self, RcError> {
        if raw.len() > MAX_RC_SIZE {
            return Err(RcError::Oversized {
                size: raw.len(),
                max: MAX_RC_SIZE,
            });
        }
        let root = bencode::decode(raw)?;
        if !matches!(root, Value::Dict(_)) {
            return Err(RcError::NotADictionary);
        }

        let identity: [u8; KEY_LEN] = fixed_bytes(&root, "k")?;
        let signature: [u8; SIG_LEN] = fixed_bytes(&root, "z")?;
        let updated_ms = root
            .get(b"u")
            .and_then(|e| e.value.as_integer())
            .ok_or(RcError::MissingField("u"))?;
        let version = root
            .get(b"v")
            .and_then(|e| e.value.as_integer())
            .ok_or(RcError::MissingField("v"))?;
        if let Some(addrs) = root.get(b"a") {
            if !matches!(addrs.value, Value::List(_)) {
                return Err(RcError::MissingField("a"));
            }
        }

        let sig_entry = root.get(b"z").ok_or(RcError::MissingField("z"))?;
        let signature_offset = sig_entry.span.end - SIG_LEN;

        Ok(Self {
            raw,
            identity,
            updated_ms,
            version,
            signature,
            signature_offset,
        })
    }

    pub fn router_id(&self) -> RouterId {
        RouterId(self.identity)
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// Signing time, if it fits a calendar date.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.updated_ms)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    /// The bytes the signature covers: the record with the signature zeroed.
    pub fn signed_payload(&self) -> Vec<u8> {
        let mut payload = self.raw.to_vec();
        payload[self.signature_offset..self.signature_offset + SIG_LEN].fill(0);
        payload
    }

    /// Full verification at instant `now`: version, signature and time bounds.
    pub fn verify(&self, now: DateTime<Utc>, policy: &ValidationPolicy) -> Result<(), RcError> {
        if self.version != RC_VERSION {
            return Err(RcError::UnsupportedVersion(self.version));
        }

        let key = VerifyingKey::from_bytes(&self.identity)
            .map_err(|e| RcError::InvalidPublicKey(e.to_string()))?;
        let signature = Signature::from_bytes(&self.signature);
        key.verify_strict(&self.signed_payload(), &signature)
            .map_err(|_| RcError::BadSignature)?;

        let updated = self
            .updated_at()
            .ok_or(RcError::InvalidTimestamp(self.updated_ms))?;
        if updated > now + policy.max_clock_skew {
            return Err(RcError::FromTheFuture {
                ahead_secs: (updated - now).num_seconds(),
            });
        }
        let age = now - updated;
        if age > policy.lifetime {
            return Err(RcError::Expired {
                age_secs: age.num_seconds(),
            });
        }
        Ok(())
    }
}

fn fixed_bytes<const N: usize>(root: &Value<'_>, field: &'static str) -> Result<[u8; N], RcError> {
    let bytes = root
        .get(field.as_bytes())
        .and_then(|e| e.value.as_bytes())
        .ok_or(RcError::MissingField(field))?;
    bytes.try_into().map_err(|_| RcError::FieldLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

// -- Builder ------------------------------------------------------------------

/// Produces signed RCs. Used by the operator CLI to seed a store and by tests.
pub struct RouterContactBuilder<'k> {
    key: &'k SigningKey,
    addresses: Vec<Vec<u8>>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl<'k> RouterContactBuilder<'k> {
    pub fn new(key: &'k SigningKey) -> Self {
        Self {
            key,
            addresses: Vec::new(),
            updated_at: Utc::now(),
            version: RC_VERSION,
        }
    }

    /// Add an opaque reachability entry.
    pub fn address(mut self, addr: impl Into<Vec<u8>>) -> Self {
        self.addresses.push(addr.into());
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }

    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Encode and sign.
    pub fn sign(self) -> Vec<u8> {
        let mut out = vec![b'd'];
        if !self.addresses.is_empty() {
            bencode::write_bytes(&mut out, b"a");
            out.push(b'l');
            for addr in &self.addresses {
                bencode::write_bytes(&mut out, addr);
            }
            out.push(b'e');
        }
        bencode::write_bytes(&mut out, b"k");
        bencode::write_bytes(&mut out, self.key.verifying_key().as_bytes());
        bencode::write_bytes(&mut out, b"u");
        bencode::write_integer(&mut out, self.updated_at.timestamp_millis());
        bencode::write_bytes(&mut out, b"v");
        bencode::write_integer(&mut out, self.version);
        bencode::write_bytes(&mut out, b"z");
        bencode::write_bytes(&mut out, &[0u8; SIG_LEN]);
        out.push(b'e');

        // The signature is the last value before the closing `e`.
        let sig_start = out.len() - 1 - SIG_LEN;
        let signature = self.key.sign(&out);
        out[sig_start..sig_start + SIG_LEN].copy_from_slice(&signature.to_bytes());
        out
    }
}

// -- Validator contract -------------------------------------------------------

/// Answers "is this a valid RC, and whose is it?".
///
/// The store only ever sees RCs through this trait, so tests can swap in a
/// permissive or scripted implementation.
pub trait RcValidator: Send + Sync {
    /// Whether `bytes` is a well-formed, correctly signed, unexpired RC.
    fn validate(&self, bytes: &[u8]) -> bool;

    /// The identity of an RC that passed [`RcValidator::validate`], or
    /// `None` when it cannot be extracted.
    fn extract_identifier(&self, bytes: &[u8]) -> Option<RouterId>;
}

/// Validator for the signed bencoded format, checked at the wall clock or at
/// a pinned instant.
#[derive(Debug, Clone)]
pub struct SignedRcValidator {
    policy: ValidationPolicy,
    pinned_now: Option<DateTime<Utc>>,
}

impl SignedRcValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self {
            policy,
            pinned_now: None,
        }
    }

    /// A validator whose clock always reads `now`.
    pub fn pinned(policy: ValidationPolicy, now: DateTime<Utc>) -> Self {
        Self {
            policy,
            pinned_now: Some(now),
        }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    fn now(&self) -> DateTime<Utc> {
        self.pinned_now.unwrap_or_else(Utc::now)
    }

    /// Decode and verify, returning the reason on failure.
    pub fn check(&self, bytes: &[u8]) -> Result<RouterId, RcError> {
        let rc = RouterContact::decode(bytes)?;
        rc.verify(self.now(), &self.policy)?;
        Ok(rc.router_id())
    }
}

impl Default for SignedRcValidator {
    fn default() -> Self {
        Self::new(ValidationPolicy::default())
    }
}

impl RcValidator for SignedRcValidator {
    fn validate(&self, bytes: &[u8]) -> bool {
        match self.check(bytes) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "router contact rejected");
                false
            }
        }
    }

    fn extract_identifier(&self, bytes: &[u8]) -> Option<RouterId> {
        RouterContact::decode(bytes).ok().map(|rc| rc.router_id())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    pub(crate) fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn validator() -> SignedRcValidator {
        SignedRcValidator::pinned(ValidationPolicy::default(), epoch())
    }

    #[test]
    fn router_id_hex_round_trip() {
        let id = RouterId::from_bytes([0xab; 32]);
        let text = id.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<RouterId>().unwrap(), id);
    }

    #[test]
    fn router_id_rejects_uppercase_and_junk() {
        assert!("AB".repeat(32).parse::<RouterId>().is_err());
        assert!("ab".repeat(31).parse::<RouterId>().is_err());
        assert!(".prune.lock".parse::<RouterId>().is_err());
    }

    #[test]
    fn signed_rc_validates_and_yields_identity() {
        let k = key(1);
        let rc = RouterContactBuilder::new(&k)
            .address("10.0.0.1:1090")
            .updated_at(epoch())
            .sign();
        let v = validator();
        assert!(v.validate(&rc));
        let id = v.extract_identifier(&rc).unwrap();
        assert_eq!(id.as_bytes(), k.verifying_key().as_bytes());
    }

    #[test]
    fn tampered_rc_fails_signature() {
        let k = key(2);
        let mut rc = RouterContactBuilder::new(&k)
            .address("10.0.0.2:1090")
            .updated_at(epoch())
            .sign();
        // Flip a byte inside the address entry.
        let pos = rc.windows(4).position(|w| w == b"10.0").unwrap();
        rc[pos] = b'9';
        assert_eq!(validator().check(&rc), Err(RcError::BadSignature));
    }

    #[test]
    fn expired_rc_is_rejected() {
        let k = key(3);
        let rc = RouterContactBuilder::new(&k)
            .updated_at(epoch() - Duration::hours(25))
            .sign();
        assert!(matches!(
            validator().check(&rc),
            Err(RcError::Expired { .. })
        ));
    }

    #[test]
    fn rc_from_the_future_is_rejected() {
        let k = key(4);
        let rc = RouterContactBuilder::new(&k)
            .updated_at(epoch() + Duration::hours(1))
            .sign();
        assert!(matches!(
            validator().check(&rc),
            Err(RcError::FromTheFuture { .. })
        ));
    }

    #[test]
    fn small_clock_skew_is_tolerated() {
        let k = key(5);
        let rc = RouterContactBuilder::new(&k)
            .updated_at(epoch() + Duration::minutes(5))
            .sign();
        assert!(validator().validate(&rc));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let k = key(6);
        let rc = RouterContactBuilder::new(&k)
            .updated_at(epoch())
            .version(7)
            .sign();
        assert_eq!(validator().check(&rc), Err(RcError::UnsupportedVersion(7)));
    }

    #[test]
    fn garbage_is_rejected_without_identifier() {
        let v = validator();
        assert!(!v.validate(b"not an rc"));
        assert!(v.extract_identifier(b"not an rc").is_none());
        assert_eq!(v.check(b"i1e").unwrap_err(), RcError::NotADictionary);
    }

    #[test]
    fn short_key_reports_field_length() {
        let mut raw = vec![b'd'];
        bencode::write_bytes(&mut raw, b"k");
        bencode::write_bytes(&mut raw, &[1u8; 31]);
        raw.push(b'e');
        assert_eq!(
            RouterContact::decode(&raw).unwrap_err(),
            RcError::FieldLength {
                field: "k",
                expected: 32,
                actual: 31
            }
        );
    }

    #[test]
    fn oversized_input_is_rejected_before_decoding() {
        let raw = vec![b'd'; MAX_RC_SIZE + 1];
        assert!(matches!(
            RouterContact::decode(&raw),
            Err(RcError::Oversized { .. })
        ));
    }

    #[test]
    fn signed_payload_zeroes_only_the_signature() {
        let k = key(7);
        let rc = RouterContactBuilder::new(&k).updated_at(epoch()).sign();
        let decoded = RouterContact::decode(&rc).unwrap();
        let payload = decoded.signed_payload();
        assert_eq!(payload.len(), rc.len());
        assert_eq!(&payload[payload.len() - 1 - SIG_LEN..payload.len() - 1], &[0u8; SIG_LEN]);
        assert_eq!(&payload[..payload.len() - 1 - SIG_LEN], &rc[..rc.len() - 1 - SIG_LEN]);
    }
}
