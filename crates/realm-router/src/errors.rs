//! Router error types.
//!
//! Only conditions visible to the caller of `send` (or a convenience wrapper)
//! are errors. Handler failures become `system.error` replies instead.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`crate::Router`] send operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Target realm is neither connected nor attached.
    #[error("No transport to realm '{realm}'")]
    NoTransport { realm: String },

    /// No correlated reply arrived in time. The pending slot is already gone.
    #[error("No reply to message {message_id} within {after:?}")]
    Timeout { message_id: String, after: Duration },

    /// Target realm was disconnected while a reply was pending.
    #[error("Realm '{realm}' disconnected while a reply was pending")]
    Disconnected { realm: String },

    /// A request with this id is already awaiting a reply.
    #[error("Message {message_id} is already awaiting a reply")]
    DuplicateRequest { message_id: String },

    /// The target answered with a `system.error` message.
    #[error("Realm replied to {message_id} with an error: {error}")]
    Remote { message_id: String, error: String },

    /// The reply did not carry the expected payload.
    #[error("Unexpected reply to {message_id}: {reason}")]
    UnexpectedReply { message_id: String, reason: String },
}

impl RouterError {
    /// True for errors worth retrying at the call site.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Disconnected { .. })
    }
}
