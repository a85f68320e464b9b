//! # Realm Directory
//!
//! Owns every [`RealmNode`] in the process, keyed by realm name, and gates
//! sends through an [`AccessControl`] policy.

use crate::config::{ConfigError, NodeConfig};
use crate::node::RealmNode;
use parking_lot::RwLock;
use realm_router::{Message, RouterError};
use realm_types::AccessControl;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No node is registered under this name.
    #[error("Unknown realm '{0}'")]
    UnknownRealm(String),

    /// The access policy refused the exchange.
    #[error("Realm '{source_realm}' may not reach '{target_realm}'")]
    AccessDenied {
        source_realm: String,
        target_realm: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Process-wide table of realm nodes.
pub struct RealmDirectory {
    nodes: RwLock<BTreeMap<String, Arc<RealmNode>>>,
    /// Template for nodes created on demand; its realm name is ignored.
    defaults: NodeConfig,
    access: Arc<dyn AccessControl>,
}

impl RealmDirectory {
    /// Create a directory whose on-demand nodes copy `defaults`.
    pub fn new(defaults: NodeConfig, access: Arc<dyn AccessControl>) -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            defaults,
            access,
        }
    }

    /// The node for `realm`, created from the defaults if absent.
    ///
    /// # Errors
    ///
    /// `Config` if the resulting configuration is invalid.
    pub fn get_or_create(&self, realm: &str) -> Result<Arc<RealmNode>, DirectoryError> {
        if let Some(node) = self.get(realm) {
            return Ok(node);
        }

        let config = NodeConfig {
            realm: realm.to_string(),
            ..self.defaults.clone()
        };
        let node = Arc::new(RealmNode::new(config)?);

        // Another caller may have raced us; the first insert wins.
        let mut nodes = self.nodes.write();
        let node = nodes.entry(realm.to_string()).or_insert(node).clone();
        Ok(node)
    }

    /// Register a node built elsewhere. Replaces any node with the same realm.
    pub fn insert(&self, node: Arc<RealmNode>) -> Option<Arc<RealmNode>> {
        self.nodes.write().insert(node.realm().to_string(), node)
    }

    /// The node for `realm`, if registered.
    #[must_use]
    pub fn get(&self, realm: &str) -> Option<Arc<RealmNode>> {
        self.nodes.read().get(realm).cloned()
    }

    /// Unregister `realm`, disconnecting it from every peer first.
    pub async fn remove(&self, realm: &str) -> Option<Arc<RealmNode>> {
        let node = self.nodes.write().remove(realm)?;
        for peer in node.router().connected_realms() {
            node.disconnect(&peer).await;
        }
        debug!(realm = realm, "Realm removed from directory");
        Some(node)
    }

    /// Registered realm names, sorted.
    #[must_use]
    pub fn realms(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    /// Connect two registered realms.
    ///
    /// # Errors
    ///
    /// `UnknownRealm` if either is not registered.
    pub async fn connect(&self, a: &str, b: &str) -> Result<(), DirectoryError> {
        let first = self.require(a)?;
        let second = self.require(b)?;
        first.connect(&second).await;
        Ok(())
    }

    /// Send `message` from its source realm after consulting the access policy.
    ///
    /// # Errors
    ///
    /// `UnknownRealm` for an unregistered source, `AccessDenied` when the
    /// policy refuses, or any `Router` error from the send itself.
    pub async fn send_checked(
        &self,
        message: Message,
        wait_response: bool,
        permission: Option<&str>,
    ) -> Result<Option<Message>, DirectoryError> {
        let source = message.source.realm.clone();
        let target = message.target.realm.clone();

        if !self.access.can_access(&source, &target, permission) {
            warn!(
                source = %source,
                target = %target,
                permission = permission.unwrap_or("-"),
                "Access denied"
            );
            return Err(DirectoryError::AccessDenied {
                source_realm: source,
                target_realm: target,
            });
        }

        let node = self.require(&source)?;
        Ok(node.router().send(message, wait_response).await?)
    }

    fn require(&self, realm: &str) -> Result<Arc<RealmNode>, DirectoryError> {
        self.get(realm)
            .ok_or_else(|| DirectoryError::UnknownRealm(realm.to_string()))
    }
}

impl std::fmt::Debug for RealmDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmDirectory")
            .field("realms", &self.realms())
            .finish_non_exhaustive()
    }
}
