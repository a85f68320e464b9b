//! # Peer Table
//!
//! Realm name -> weak handle lookup used for bus-to-bus and
//! router-to-router connections.
//!
//! Handles are [`Weak`], so two connected nodes never keep each other alive
//! and disconnecting is a plain table deletion. A handle whose node has been
//! dropped is pruned the next time it is looked up.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Connection table keyed by realm name.
pub struct PeerTable<T: ?Sized> {
    peers: RwLock<BTreeMap<String, Weak<T>>>,
}

impl<T: ?Sized> PeerTable<T> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace the handle for `realm`.
    ///
    /// Returns true if the realm was not present before.
    pub fn insert(&self, realm: impl Into<String>, peer: &Arc<T>) -> bool {
        self.peers
            .write()
            .insert(realm.into(), Arc::downgrade(peer))
            .is_none()
    }

    /// Remove the handle for `realm`. Returns true if one was present.
    pub fn remove(&self, realm: &str) -> bool {
        self.peers.write().remove(realm).is_some()
    }

    /// Live handle for `realm`, if connected.
    #[must_use]
    pub fn get(&self, realm: &str) -> Option<Arc<T>> {
        let upgraded = {
            let peers = self.peers.read();
            match peers.get(realm) {
                Some(weak) => weak.upgrade(),
                None => return None,
            }
        };

        if upgraded.is_none() {
            debug!(realm, "Pruning dropped peer");
            self.peers.write().remove(realm);
        }
        upgraded
    }

    /// True if `realm` has an entry (live or not yet pruned).
    #[must_use]
    pub fn contains(&self, realm: &str) -> bool {
        self.peers.read().contains_key(realm)
    }

    /// Connected realm names in sorted order.
    #[must_use]
    pub fn realms(&self) -> Vec<String> {
        self.peers.read().keys().cloned().collect()
    }

    /// Every live peer in realm-name order. Dropped peers are pruned.
    #[must_use]
    pub fn live(&self) -> Vec<(String, Arc<T>)> {
        let mut live = Vec::new();
        let mut dead = Vec::new();
        {
            let peers = self.peers.read();
            for (realm, weak) in peers.iter() {
                match weak.upgrade() {
                    Some(peer) => live.push((realm.clone(), peer)),
                    None => dead.push(realm.clone()),
                }
            }
        }

        if !dead.is_empty() {
            let mut peers = self.peers.write();
            for realm in dead {
                peers.remove(&realm);
            }
        }
        live
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// True if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.peers.write().clear();
    }
}

impl<T: ?Sized> Default for PeerTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
