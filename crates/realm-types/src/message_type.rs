//! # Message Types
//!
//! The closed set of protocol message kinds, grouped by concern. Handlers
//! register against a specific kind; adding a kind means extending this enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageType {
    // =========================================================================
    // MEMORY
    // =========================================================================
    /// Query another realm's memory store.
    #[serde(rename = "memory.query")]
    MemoryQuery,
    /// Results of a memory query.
    #[serde(rename = "memory.result")]
    MemoryResult,
    /// Share a memory with another realm.
    #[serde(rename = "memory.share")]
    MemoryShare,
    /// Acknowledge a shared memory.
    #[serde(rename = "memory.ack")]
    MemoryAck,

    // =========================================================================
    // KAITIAKI
    // =========================================================================
    /// Ask a kaitiaki in another realm to perform a task.
    #[serde(rename = "kaitiaki.request")]
    KaitiakiRequest,
    /// A kaitiaki's answer to a request.
    #[serde(rename = "kaitiaki.response")]
    KaitiakiResponse,
    /// Broadcast from a kaitiaki to every connected realm.
    #[serde(rename = "kaitiaki.broadcast")]
    KaitiakiBroadcast,

    // =========================================================================
    // PIPELINE
    // =========================================================================
    /// Trigger a pipeline in another realm.
    #[serde(rename = "pipeline.trigger")]
    PipelineTrigger,
    /// Output of a triggered pipeline.
    #[serde(rename = "pipeline.result")]
    PipelineResult,
    /// Chain a pipeline's output into another realm's pipeline.
    #[serde(rename = "pipeline.chain")]
    PipelineChain,

    // =========================================================================
    // SYSTEM
    // =========================================================================
    /// Liveness ping.
    #[serde(rename = "system.heartbeat")]
    Heartbeat,
    /// A realm announcing itself.
    #[serde(rename = "system.register")]
    Register,
    /// A realm withdrawing.
    #[serde(rename = "system.unregister")]
    Unregister,
    /// Protocol-level error reply.
    #[serde(rename = "system.error")]
    Error,
}

impl MessageType {
    /// Every message kind, in declaration order.
    pub const ALL: [MessageType; 14] = [
        Self::MemoryQuery,
        Self::MemoryResult,
        Self::MemoryShare,
        Self::MemoryAck,
        Self::KaitiakiRequest,
        Self::KaitiakiResponse,
        Self::KaitiakiBroadcast,
        Self::PipelineTrigger,
        Self::PipelineResult,
        Self::PipelineChain,
        Self::Heartbeat,
        Self::Register,
        Self::Unregister,
        Self::Error,
    ];

    /// Wire value, e.g. `"memory.query"`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemoryQuery => "memory.query",
            Self::MemoryResult => "memory.result",
            Self::MemoryShare => "memory.share",
            Self::MemoryAck => "memory.ack",
            Self::KaitiakiRequest => "kaitiaki.request",
            Self::KaitiakiResponse => "kaitiaki.response",
            Self::KaitiakiBroadcast => "kaitiaki.broadcast",
            Self::PipelineTrigger => "pipeline.trigger",
            Self::PipelineResult => "pipeline.result",
            Self::PipelineChain => "pipeline.chain",
            Self::Heartbeat => "system.heartbeat",
            Self::Register => "system.register",
            Self::Unregister => "system.unregister",
            Self::Error => "system.error",
        }
    }

    /// The kind a handler's answer to this kind is sent as.
    #[must_use]
    pub fn reply_type(&self) -> MessageType {
        match self {
            Self::MemoryQuery => Self::MemoryResult,
            Self::MemoryShare => Self::MemoryAck,
            Self::KaitiakiRequest => Self::KaitiakiResponse,
            Self::PipelineTrigger | Self::PipelineChain => Self::PipelineResult,
            other => *other,
        }
    }

    /// Concern group: `"memory"`, `"kaitiaki"`, `"pipeline"` or `"system"`.
    #[must_use]
    pub fn group(&self) -> &'static str {
        let wire = self.as_str();
        wire.split_once('.').map_or(wire, |(group, _)| group)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown wire value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown message type: {0}")]
pub struct UnknownMessageType(pub String);

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownMessageType(s.to_string()))
    }
}
