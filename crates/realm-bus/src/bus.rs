//! # Event Bus
//!
//! Realm-local publish/subscribe hub with one-hop propagation to connected
//! buses.

use crate::history::EventHistory;
use crate::subscription::{EventFilter, EventHandler, Subscription, SubscriptionId};
use crate::DEFAULT_MAX_HISTORY;
use parking_lot::{Mutex, RwLock};
use realm_types::{Event, Payload, PeerTable, Tags};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Maximum events kept in history.
    pub max_history: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

/// Per-realm event bus.
///
/// Subscription table, history and connections are each guarded; no lock is
/// held while a handler runs.
pub struct EventBus {
    /// Realm stamped on every published event.
    realm: String,

    /// Subscriptions in registration order.
    subscriptions: RwLock<Vec<Arc<Subscription>>>,

    /// Bounded history of published and received events.
    history: Mutex<EventHistory>,

    /// Directly connected buses.
    peers: PeerTable<EventBus>,

    /// Total events published by this bus.
    events_published: AtomicU64,
}

impl EventBus {
    /// Create a bus for `realm` with default configuration.
    #[must_use]
    pub fn new(realm: impl Into<String>) -> Self {
        Self::with_config(realm, BusConfig::default())
    }

    /// Create a bus for `realm` with the given configuration.
    #[must_use]
    pub fn with_config(realm: impl Into<String>, config: BusConfig) -> Self {
        Self {
            realm: realm.into(),
            subscriptions: RwLock::new(Vec::new()),
            history: Mutex::new(EventHistory::new(config.max_history)),
            peers: PeerTable::new(),
            events_published: AtomicU64::new(0),
        }
    }

    /// Realm this bus belongs to.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Subscribe to events matching a filter. Always succeeds.
    pub fn subscribe(&self, filter: EventFilter, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let subscription = Subscription::new(filter, handler);
        let id = subscription.id().clone();

        debug!(
            realm = %self.realm,
            subscription = %id,
            pattern = %subscription.filter().pattern,
            "New subscription created"
        );

        self.subscriptions.write().push(Arc::new(subscription));
        id
    }

    /// Subscribe to events whose name matches `pattern`, from any realm.
    pub fn on(&self, pattern: &str, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.subscribe(EventFilter::pattern(pattern), handler)
    }

    /// Remove a subscription. Idempotent; returns true if one was removed.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id() != id);
        let removed = subscriptions.len() != before;

        if removed {
            debug!(realm = %self.realm, subscription = %id, "Subscription removed");
        }
        removed
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    // =========================================================================
    // PUBLISH / RECEIVE
    // =========================================================================

    /// Publish an event and forward it to every connected bus.
    pub async fn publish(&self, name: impl Into<String>, payload: Payload, tags: Tags) -> Event {
        self.publish_with(name, payload, tags, true).await
    }

    /// Publish an event, forwarding it to connected buses only if `propagate`.
    ///
    /// The event is recorded in history, then handed to every matching
    /// subscription in registration order.
    pub async fn publish_with(
        &self,
        name: impl Into<String>,
        payload: Payload,
        tags: Tags,
        propagate: bool,
    ) -> Event {
        let event = Event::new(name, self.realm.clone(), payload, tags);
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.history.lock().push(event.clone());

        let delivered = self.dispatch(&event).await;

        let mut forwarded = 0usize;
        if propagate {
            for (_, peer) in self.peers.live() {
                peer.receive(event.clone()).await;
                forwarded += 1;
            }
        }

        debug!(
            realm = %self.realm,
            event = %event.name,
            event_id = %event.id,
            delivered,
            forwarded,
            "Event published"
        );
        event
    }

    /// Accept an event forwarded from a connected bus.
    ///
    /// Records and dispatches locally. Never forwards again.
    pub async fn receive(&self, event: Event) {
        self.history.lock().push(event.clone());
        let delivered = self.dispatch(&event).await;

        debug!(
            realm = %self.realm,
            from = %event.source_realm,
            event = %event.name,
            delivered,
            "Event received"
        );
    }

    /// Run every matching handler in order. Returns how many succeeded.
    async fn dispatch(&self, event: &Event) -> usize {
        let matching: Vec<Arc<Subscription>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.matches(event))
            .cloned()
            .collect();

        let mut delivered = 0usize;
        for subscription in matching {
            match subscription.handler().handle(event).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        realm = %self.realm,
                        subscription = %subscription.id(),
                        event = %event.name,
                        error = %e,
                        "Event handler failed"
                    );
                }
            }
        }
        delivered
    }

    /// Get the total number of events published.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// At most `limit` most-recent events matching `pattern` (and `realm`, if
    /// given), oldest first.
    #[must_use]
    pub fn get_history(&self, pattern: &str, realm: Option<&str>, limit: usize) -> Vec<Event> {
        let mut filter = EventFilter::pattern(pattern);
        if let Some(realm) = realm {
            filter = filter.from_realm(realm);
        }
        self.history_matching(&filter, limit)
    }

    /// History query with a full filter, tags included.
    #[must_use]
    pub fn history_matching(&self, filter: &EventFilter, limit: usize) -> Vec<Event> {
        self.history.lock().query(filter, limit)
    }

    /// Number of events currently in history.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// Connect two buses in both directions.
    pub fn connect(self: &Arc<Self>, other: &Arc<EventBus>) {
        if other.realm == self.realm {
            warn!(realm = %self.realm, "Refusing to connect bus to its own realm");
            return;
        }

        self.peers.insert(other.realm.clone(), other);
        other.peers.insert(self.realm.clone(), self);
        debug!(realm = %self.realm, peer = %other.realm, "Buses connected");
    }

    /// Disconnect from `realm` in both directions. Returns true if connected.
    pub fn disconnect(&self, realm: &str) -> bool {
        if let Some(other) = self.peers.get(realm) {
            other.peers.remove(&self.realm);
        }
        let removed = self.peers.remove(realm);

        if removed {
            debug!(realm = %self.realm, peer = realm, "Buses disconnected");
        }
        removed
    }

    /// Realms this bus forwards to, sorted.
    #[must_use]
    pub fn connected_realms(&self) -> Vec<String> {
        self.peers.realms()
    }

    /// True if connected to `realm`.
    #[must_use]
    pub fn is_connected(&self, realm: &str) -> bool {
        self.peers.contains(realm)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("realm", &self.realm)
            .field("subscriptions", &self.subscription_count())
            .field("peers", &self.peers.realms())
            .finish_non_exhaustive()
    }
}
