//! # Realm Types
//!
//! Value types shared by every realm's event bus and message router.
//!
//! ## Contents
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `event` | Fire-and-forget [`Event`] envelope |
//! | `envelope` | Addressed, optionally signed [`Message`] envelope |
//! | `message_type` | Closed set of protocol [`MessageType`] kinds |
//! | `security` | Bearer keys, signing and verification |
//! | `replay` | Time-bounded replay guard for signed messages |
//! | `peers` | Weak-handle connection table |
//! | `access` | Lineage access-control seam consulted by callers |
//!
//! ## Wire Compatibility
//!
//! Both envelopes serialize field-exact to the JSON shapes other realms (and
//! any future transport) expect. Timestamps are ISO-8601 strings, absent
//! optional fields serialize as `null`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod access;
pub mod envelope;
pub mod errors;
pub mod event;
pub mod message_type;
pub mod peers;
pub mod replay;
pub mod security;

pub use access::{AccessControl, AllowAll, LineageAccess};
pub use envelope::{Message, MessageAuth, MessageSource, MessageTarget, RealmAddress};
pub use errors::HandlerError;
pub use event::{tags, Event, Tags};
pub use message_type::MessageType;
pub use peers::PeerTable;
pub use replay::{ReplayError, ReplayGuard};
pub use security::{
    bearer_fingerprint, compute_signature, constant_time_compare, sign_message, verify_message,
    BearerKey, VerificationResult,
};

/// Arbitrary JSON object carried by events and messages.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Convert any JSON value into a [`Payload`].
///
/// Objects are used as-is; any other value is wrapped under a `"value"` key.
#[must_use]
pub fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => Payload::new(),
        other => {
            let mut map = Payload::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
