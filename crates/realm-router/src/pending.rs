//! Pending Response Store - correlates replies with waiting senders.
//!
//! Every slot leaves the store exactly once: on reply, on timeout, on
//! cancellation of the waiting future, or on disconnect of its target realm.

use crate::errors::RouterError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use realm_types::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A sender waiting for a reply.
struct PendingSlot {
    /// Realm the request went to.
    target_realm: String,
    /// Channel to hand the reply to.
    sender: oneshot::Sender<Message>,
    /// When the slot was registered.
    created_at: Instant,
}

/// Statistics for the pending store.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total slots registered
    pub total_registered: AtomicU64,
    /// Total slots resolved by a reply
    pub total_completed: AtomicU64,
    /// Total slots removed by timeout
    pub total_timeouts: AtomicU64,
    /// Total slots removed because the waiter went away
    pub total_cancelled: AtomicU64,
    /// Total slots failed by a disconnect
    pub total_disconnected: AtomicU64,
}

/// Map of request id to waiting sender.
///
/// Flow:
/// 1. `send` calls `register()` with the request id and gets a receiver
/// 2. `send` delivers the request and awaits the receiver
/// 3. `receive` on the same router hands any reply to `complete()`
/// 4. On timeout `send` calls `expire()` before reporting the failure
#[derive(Default)]
pub struct PendingStore {
    slots: DashMap<String, PendingSlot>,
    stats: PendingStats,
}

impl PendingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `message_id` and get the receiving end.
    ///
    /// # Errors
    ///
    /// `DuplicateRequest` if a slot for `message_id` is already waiting. The
    /// existing slot is left in place.
    pub fn register(
        &self,
        message_id: &str,
        target_realm: &str,
    ) -> Result<oneshot::Receiver<Message>, RouterError> {
        let (tx, rx) = oneshot::channel();
        match self.slots.entry(message_id.to_string()) {
            Entry::Occupied(_) => {
                warn!(message_id = message_id, "Request id already awaiting a reply");
                return Err(RouterError::DuplicateRequest {
                    message_id: message_id.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingSlot {
                    target_realm: target_realm.to_string(),
                    sender: tx,
                    created_at: Instant::now(),
                });
            }
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            message_id = message_id,
            target = target_realm,
            "Registered pending response"
        );
        Ok(rx)
    }

    /// Resolve the slot named by `reply.reply_to`.
    ///
    /// Returns the reply back if no slot matches, so the caller can dispatch
    /// it as an ordinary message.
    pub fn complete(&self, reply: Message) -> Option<Message> {
        let reply_to = match &reply.reply_to {
            Some(id) => id.clone(),
            None => return Some(reply),
        };
        let Some((_, slot)) = self.slots.remove(&reply_to) else {
            return Some(reply);
        };

        let elapsed = slot.created_at.elapsed();
        match slot.sender.send(reply) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    message_id = %reply_to,
                    response_time_ms = elapsed.as_millis(),
                    "Completed pending response"
                );
            }
            Err(_) => {
                // Waiter dropped between removal and send.
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(message_id = %reply_to, "Pending response receiver dropped");
            }
        }
        None
    }

    /// Remove a slot whose wait timed out.
    pub fn expire(&self, message_id: &str) -> bool {
        let removed = self.slots.remove(message_id).is_some();
        if removed {
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove a slot whose waiter went away.
    pub fn cancel(&self, message_id: &str) -> bool {
        let removed = self.slots.remove(message_id).is_some();
        if removed {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(message_id = message_id, "Cancelled pending response");
        }
        removed
    }

    /// Drop every slot waiting on `realm`. Their waiters observe a closed
    /// channel. Returns how many were dropped.
    pub fn fail_realm(&self, realm: &str) -> usize {
        let mut failed = 0usize;
        self.slots.retain(|_, slot| {
            if slot.target_realm == realm {
                failed += 1;
                false
            } else {
                true
            }
        });

        if failed > 0 {
            self.stats
                .total_disconnected
                .fetch_add(failed as u64, Ordering::Relaxed);
            debug!(realm = realm, failed, "Failed pending responses on disconnect");
        }
        failed
    }

    /// Number of slots currently waiting.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }

    /// True if `message_id` is waiting for a reply.
    #[must_use]
    pub fn is_pending(&self, message_id: &str) -> bool {
        self.slots.contains_key(message_id)
    }

    /// Get statistics
    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

/// Removes a slot when the waiting future is dropped early.
pub(crate) struct PendingGuard<'a> {
    store: &'a PendingStore,
    message_id: String,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(store: &'a PendingStore, message_id: impl Into<String>) -> Self {
        Self {
            store,
            message_id: message_id.into(),
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.store.cancel(&self.message_id);
    }
}
