//! # Message Signing
//!
//! Signing and verification of [`Message`] envelopes with a shared bearer key.
//!
//! ## Protocol
//!
//! - **Canonical form**: `id`, `timestamp`, source realm, target realm, `type`
//!   and `payload`, serialized as JSON with every object's keys sorted.
//! - **Signature**: hex SHA-256 of the canonical form followed by the key.
//! - **Fingerprint**: the first 16 hex characters of SHA-256 of the key. It
//!   selects which key to verify with and grants nothing by itself.
//! - **Comparison**: fingerprint and signature are both compared in constant
//!   time, and both must match.

use crate::{Message, MessageAuth, Payload};
use chrono::SecondsFormat;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Hex characters kept from the key digest for `bearer_hash`.
pub const BEARER_HASH_LEN: usize = 16;

// =============================================================================
// BEARER KEY
// =============================================================================

/// Shared secret used to sign and verify messages.
///
/// Wiped from memory on drop. `Debug` shows only the fingerprint.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BearerKey(Vec<u8>);

impl BearerKey {
    /// Wrap raw key material.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True if no key material was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-secret fingerprint of this key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        bearer_fingerprint(self)
    }
}

impl From<&str> for BearerKey {
    fn from(secret: &str) -> Self {
        Self::new(secret.as_bytes())
    }
}

impl From<String> for BearerKey {
    fn from(secret: String) -> Self {
        Self::new(secret.into_bytes())
    }
}

impl fmt::Debug for BearerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerKey").field(&self.fingerprint()).finish()
    }
}

// =============================================================================
// VERIFICATION RESULT
// =============================================================================

/// Outcome of checking a message's signature block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// Fingerprint and signature both match.
    Valid,
    /// The message has no `auth` block. Not a verification failure.
    Unsigned,
    /// `bearer_hash` does not match the candidate key.
    FingerprintMismatch,
    /// The signature does not match the message contents.
    InvalidSignature,
    /// A signed message id was seen before inside the replay window.
    ReplayDetected { message_id: String },
}

impl VerificationResult {
    /// Returns true if the verification was successful.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid)
    }

    /// Returns true if the message was signed and failed a check.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, VerificationResult::Valid | VerificationResult::Unsigned)
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Unsigned => write!(f, "message is unsigned"),
            Self::FingerprintMismatch => write!(f, "bearer fingerprint mismatch"),
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::ReplayDetected { message_id } => {
                write!(f, "replay detected for message {message_id}")
            }
        }
    }
}

// =============================================================================
// CANONICAL FORM
// =============================================================================

/// Serializes a JSON value with object keys in sorted order regardless of
/// how the map was built.
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

/// Canonical bytes covered by the signature.
#[must_use]
pub fn canonical_bytes(message: &Message) -> Vec<u8> {
    let mut fields = Payload::new();
    fields.insert("id".to_string(), Value::String(message.id.clone()));
    fields.insert(
        "timestamp".to_string(),
        Value::String(
            message
                .timestamp
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
    );
    fields.insert(
        "source".to_string(),
        Value::String(message.source.realm.clone()),
    );
    fields.insert(
        "target".to_string(),
        Value::String(message.target.realm.clone()),
    );
    fields.insert(
        "type".to_string(),
        Value::String(message.message_type.as_str().to_string()),
    );
    fields.insert(
        "payload".to_string(),
        Value::Object(message.payload.clone()),
    );

    // Serializing an in-memory Value cannot fail.
    serde_json::to_vec(&Canonical(&Value::Object(fields))).unwrap_or_default()
}

// =============================================================================
// SIGN / VERIFY
// =============================================================================

/// Fingerprint of a bearer key: truncated hex SHA-256.
#[must_use]
pub fn bearer_fingerprint(key: &BearerKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut fingerprint = hex::encode(digest);
    fingerprint.truncate(BEARER_HASH_LEN);
    fingerprint
}

/// Hex SHA-256 over the canonical form followed by the key.
#[must_use]
pub fn compute_signature(message: &Message, key: &BearerKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(message));
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Attach a signature block to `message`, replacing any existing one.
pub fn sign_message(message: &mut Message, key: &BearerKey) {
    let signature = compute_signature(message, key);
    message.auth = Some(MessageAuth {
        bearer_hash: bearer_fingerprint(key),
        signature,
    });
}

/// Check `message` against a candidate key.
///
/// # Returns
///
/// - `Unsigned` if there is no `auth` block
/// - `FingerprintMismatch` if the key is not the one that signed
/// - `InvalidSignature` if any signed field changed after signing
/// - `Valid` otherwise
pub fn verify_message(message: &Message, key: &BearerKey) -> VerificationResult {
    let Some(auth) = &message.auth else {
        return VerificationResult::Unsigned;
    };

    if !constant_time_compare(&auth.bearer_hash, &bearer_fingerprint(key)) {
        return VerificationResult::FingerprintMismatch;
    }

    if !constant_time_compare(&auth.signature, &compute_signature(message, key)) {
        return VerificationResult::InvalidSignature;
    }

    VerificationResult::Valid
}

/// Constant-time string comparison.
///
/// Runs in time dependent only on the longer input's length. Inputs of
/// different length never compare equal.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    // Distinct pad bytes so a length difference can never produce a match.
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}

// =============================================================================
// TESTS
// =============================================================================
