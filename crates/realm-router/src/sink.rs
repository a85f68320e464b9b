//! # Message Sinks
//!
//! Anything a router can hand a message to. Connected routers are sinks;
//! an out-of-process transport would be one too.

use async_trait::async_trait;
use realm_types::Message;

/// Delivery endpoint for one realm.
///
/// `deliver` runs to completion before `Router::send` continues, so a sink
/// sees messages in the order the sender sent them.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Hand over a message. Delivery failures are the sink's to log.
    async fn deliver(&self, message: Message);
}
