//! # Realm Node
//!
//! One realm's event bus and message router, constructed together from a
//! [`NodeConfig`]. Components that need either take the `Arc` handles.

use crate::config::{ConfigError, NodeConfig};
use realm_bus::EventBus;
use realm_router::Router;
use realm_types::{tags, Payload};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Event published on a node's own bus when a router link comes up.
pub const ROUTER_CONNECTED: &str = "router.connected";

/// Event published on a node's own bus when a router link goes away.
pub const ROUTER_DISCONNECTED: &str = "router.disconnected";

/// Tag carried by lifecycle events.
pub const SYSTEM_TAG: &str = "system";

/// A realm's bus + router pair.
#[derive(Debug)]
pub struct RealmNode {
    realm: String,
    bus: Arc<EventBus>,
    router: Arc<Router>,
}

impl RealmNode {
    /// Build the bus and router for `config.realm`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] reported by `config.validate()`.
    pub fn new(config: NodeConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let bus = Arc::new(EventBus::with_config(config.realm.clone(), config.bus));
        let router = Arc::new(Router::with_config(config.realm.clone(), config.router));

        info!(
            realm = %config.realm,
            signed = router.config().bearer_key.is_some(),
            verify_policy = %router.config().verify_policy,
            "Realm node created"
        );

        Ok(Self {
            realm: config.realm,
            bus,
            router,
        })
    }

    /// Realm name.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Event bus handle.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Message router handle.
    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Connect both the buses and the routers of two nodes.
    ///
    /// Each node announces the link on its own bus, without propagation.
    pub async fn connect(&self, other: &RealmNode) {
        self.bus.connect(&other.bus);
        self.router.connect(&other.router);

        self.announce(ROUTER_CONNECTED, &other.realm).await;
        other.announce(ROUTER_CONNECTED, &self.realm).await;
    }

    /// Disconnect from `realm` on both bus and router.
    ///
    /// Returns true if the router link existed.
    pub async fn disconnect(&self, realm: &str) -> bool {
        self.bus.disconnect(realm);
        let removed = self.router.disconnect(realm);
        if removed {
            self.announce(ROUTER_DISCONNECTED, realm).await;
        }
        removed
    }

    async fn announce(&self, name: &str, peer: &str) {
        let mut payload = Payload::new();
        payload.insert("peer".to_string(), json!(peer));
        self.bus
            .publish_with(name, payload, tags([SYSTEM_TAG]), false)
            .await;
    }
}
