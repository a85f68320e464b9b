//! # Message Envelope
//!
//! The addressed wrapper for every request, reply and broadcast exchanged
//! between realm routers.
//!
//! ## Properties
//!
//! - **Identity**: every instance gets a fresh `id` at creation.
//! - **Correlation**: `reply_to` is the only correlation mechanism; it names
//!   the `id` of the message being answered.
//! - **Authentication**: `auth` is present iff the sending router holds a
//!   bearer key. An absent `auth` means the message travels unsigned.

use crate::{MessageType, Payload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Addressing tuple. The realm is the only field the router routes on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RealmAddress {
    /// Realm name (routing key).
    pub realm: String,
    /// Kaitiaki inside the realm, if any.
    pub kaitiaki: Option<String>,
    /// Component inside the realm, if any.
    pub component: Option<String>,
}

/// Where a message came from.
pub type MessageSource = RealmAddress;

/// Where a message is going.
pub type MessageTarget = RealmAddress;

impl RealmAddress {
    /// Address a whole realm.
    #[must_use]
    pub fn realm(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            kaitiaki: None,
            component: None,
        }
    }

    /// Narrow the address to a kaitiaki.
    #[must_use]
    pub fn with_kaitiaki(mut self, kaitiaki: impl Into<String>) -> Self {
        self.kaitiaki = Some(kaitiaki.into());
        self
    }

    /// Narrow the address to a component.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

/// Signature block attached by a router that holds a bearer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuth {
    /// Truncated SHA-256 fingerprint of the bearer key. Selects the key to
    /// verify with; not a capability.
    pub bearer_hash: String,
    /// Hex SHA-256 over the canonical message fields followed by the key.
    pub signature: String,
}

/// An addressed, typed, optionally signed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Sender address.
    pub source: MessageSource,
    /// Recipient address.
    pub target: MessageTarget,
    /// Protocol kind.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Message body.
    pub payload: Payload,
    /// Signature block, if the sender signs.
    pub auth: Option<MessageAuth>,
    /// Id of the message this one answers.
    pub reply_to: Option<String>,
}

impl Message {
    /// Create an unsigned message with a fresh id and the current time.
    #[must_use]
    pub fn new(
        source: MessageSource,
        target: MessageTarget,
        message_type: MessageType,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source,
            target,
            message_type,
            payload,
            auth: None,
            reply_to: None,
        }
    }

    /// Mark this message as answering `original_id`.
    #[must_use]
    pub fn in_reply_to(mut self, original_id: impl Into<String>) -> Self {
        self.reply_to = Some(original_id.into());
        self
    }

    /// Build the answer to this message.
    ///
    /// The reply is addressed to this message's source, carries the
    /// kind given by [`MessageType::reply_type`], and correlates via
    /// `reply_to`.
    #[must_use]
    pub fn reply(&self, source: MessageSource, payload: Payload) -> Message {
        Message::new(
            source,
            self.source.clone(),
            self.message_type.reply_type(),
            payload,
        )
        .in_reply_to(self.id.clone())
    }

    /// Build a `system.error` reply carrying `error` as text.
    #[must_use]
    pub fn error_reply(&self, source: MessageSource, error: &str) -> Message {
        let mut payload = Payload::new();
        payload.insert("error".to_string(), error.into());
        payload.insert(
            "original_type".to_string(),
            self.message_type.as_str().into(),
        );
        Message::new(source, self.source.clone(), MessageType::Error, payload)
            .in_reply_to(self.id.clone())
    }

    /// True if the message carries a signature block.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.auth.is_some()
    }

    /// True if the message answers another message.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// Error text of a `system.error` message.
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        if self.message_type != MessageType::Error {
            return None;
        }
        self.payload.get("error").and_then(|v| v.as_str())
    }
}
