//! # Message Router
//!
//! Per-realm request/response hub. Outgoing messages are signed when the
//! router holds a bearer key, resolved against the connection table and
//! delivered in order. Incoming messages either resolve a pending slot or
//! are dispatched to the handlers registered for their type.

use crate::config::{RouterConfig, VerifyPolicy};
use crate::errors::RouterError;
use crate::handler::{HandlerId, MessageHandler, Registration};
use crate::pending::{PendingGuard, PendingStats, PendingStore};
use crate::sink::MessageSink;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use realm_types::{
    sign_message, verify_message, Message, MessageSource, MessageType, Payload, PeerTable,
    RealmAddress, ReplayError, ReplayGuard, VerificationResult,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-realm message router.
pub struct Router {
    /// Realm this router speaks for.
    realm: String,

    config: RouterConfig,

    /// Handlers per message type, in registration order.
    handlers: RwLock<HashMap<MessageType, Vec<Registration>>>,

    /// Requests sent by this router that await a reply.
    pending: PendingStore,

    /// Connected in-process routers.
    routers: PeerTable<Router>,

    /// Externally attached sinks, owned by the router.
    sinks: RwLock<BTreeMap<String, Arc<dyn MessageSink>>>,

    /// Ids of verified signed messages already accepted.
    replay: Mutex<ReplayGuard>,

    messages_sent: AtomicU64,
    messages_received: AtomicU64,
}

impl Router {
    /// Create a router for `realm` with default configuration.
    #[must_use]
    pub fn new(realm: impl Into<String>) -> Self {
        Self::with_config(realm, RouterConfig::default())
    }

    /// Create a router for `realm` with the given configuration.
    #[must_use]
    pub fn with_config(realm: impl Into<String>, config: RouterConfig) -> Self {
        Self {
            realm: realm.into(),
            config,
            handlers: RwLock::new(HashMap::new()),
            pending: PendingStore::new(),
            routers: PeerTable::new(),
            sinks: RwLock::new(BTreeMap::new()),
            replay: Mutex::new(ReplayGuard::new()),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
        }
    }

    /// Realm this router speaks for.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Source address used for messages this router originates.
    #[must_use]
    pub fn address(&self) -> MessageSource {
        RealmAddress::realm(self.realm.clone())
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Build a message from this realm to `target_realm`.
    #[must_use]
    pub fn message(
        &self,
        target_realm: impl Into<String>,
        message_type: MessageType,
        payload: Payload,
    ) -> Message {
        Message::new(
            self.address(),
            RealmAddress::realm(target_realm),
            message_type,
            payload,
        )
    }

    // =========================================================================
    // HANDLERS
    // =========================================================================

    /// Register a handler for `message_type`. Handlers of one type run in
    /// registration order.
    pub fn on(&self, message_type: MessageType, handler: Arc<dyn MessageHandler>) -> HandlerId {
        let id = HandlerId::generate();
        self.handlers
            .write()
            .entry(message_type)
            .or_default()
            .push(Registration {
                id: id.clone(),
                handler,
            });

        debug!(realm = %self.realm, message_type = %message_type, handler = %id, "Handler registered");
        id
    }

    /// Remove one handler, or every handler for the type when `id` is `None`.
    /// Returns how many were removed.
    pub fn off(&self, message_type: MessageType, id: Option<&HandlerId>) -> usize {
        let mut handlers = self.handlers.write();
        let removed = match id {
            None => handlers.remove(&message_type).map_or(0, |list| list.len()),
            Some(id) => {
                let Some(list) = handlers.get_mut(&message_type) else {
                    return 0;
                };
                let before = list.len();
                list.retain(|r| &r.id != id);
                let removed = before - list.len();
                if list.is_empty() {
                    handlers.remove(&message_type);
                }
                removed
            }
        };

        if removed > 0 {
            debug!(realm = %self.realm, message_type = %message_type, removed, "Handlers removed");
        }
        removed
    }

    /// Number of handlers registered for `message_type`.
    #[must_use]
    pub fn handler_count(&self, message_type: MessageType) -> usize {
        self.handlers.read().get(&message_type).map_or(0, Vec::len)
    }

    // =========================================================================
    // SEND
    // =========================================================================

    /// Sign (if keyed) and deliver `message` to its target realm.
    ///
    /// With `wait_response` the call suspends until a reply whose `reply_to`
    /// names this message arrives, or the configured timeout elapses. The
    /// timeout starts once delivery has returned. Nothing is retried.
    ///
    /// # Errors
    ///
    /// - `NoTransport`: target realm is not connected or attached
    /// - `Timeout`: no reply in time (the pending slot is already removed)
    /// - `Disconnected`: target realm was disconnected while waiting
    /// - `DuplicateRequest`: a request with the same id is already waiting
    #[instrument(
        skip_all,
        fields(
            realm = %self.realm,
            message_id = %message.id,
            message_type = %message.message_type,
            target = %message.target.realm,
        )
    )]
    pub async fn send(
        &self,
        mut message: Message,
        wait_response: bool,
    ) -> Result<Option<Message>, RouterError> {
        if let Some(key) = &self.config.bearer_key {
            sign_message(&mut message, key);
        }

        let target = message.target.realm.clone();
        let Some(sink) = self.resolve(&target) else {
            warn!("No transport to target realm");
            return Err(RouterError::NoTransport { realm: target });
        };

        if !wait_response {
            self.messages_sent.fetch_add(1, Ordering::Relaxed);
            sink.deliver(message).await;
            return Ok(None);
        }

        let message_id = message.id.clone();
        let rx = self.pending.register(&message_id, &target)?;
        let _guard = PendingGuard::new(&self.pending, message_id.clone());

        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        sink.deliver(message).await;
        drop(sink);

        let after = self.config.response_timeout;
        match tokio::time::timeout(after, rx).await {
            Ok(Ok(reply)) => Ok(Some(reply)),
            Ok(Err(_)) => Err(RouterError::Disconnected { realm: target }),
            Err(_) => {
                self.pending.expire(&message_id);
                warn!(timeout_ms = after.as_millis(), "No reply before timeout");
                Err(RouterError::Timeout { message_id, after })
            }
        }
    }

    /// Send `payload` as the reply to `original`, without waiting.
    ///
    /// # Errors
    ///
    /// `NoTransport` if the original sender is not reachable.
    pub async fn reply(&self, original: &Message, payload: Payload) -> Result<(), RouterError> {
        let reply = original.reply(self.address(), payload);
        self.send(reply, false).await.map(|_| ())
    }

    /// Fire-and-forget send whose failure is only logged.
    async fn send_detached(&self, message: Message) {
        let message_id = message.id.clone();
        if let Err(e) = self.send(message, false).await {
            warn!(realm = %self.realm, message_id = %message_id, error = %e, "Could not route reply");
        }
    }

    // =========================================================================
    // RECEIVE
    // =========================================================================

    /// Accept an incoming message.
    ///
    /// A reply to a pending request resolves that request and goes no
    /// further. Anything else is dispatched to the handlers for its type.
    /// Nothing here fails the caller: handler errors become `system.error`
    /// replies to the sender.
    #[instrument(
        skip_all,
        fields(
            realm = %self.realm,
            message_id = %message.id,
            message_type = %message.message_type,
            from = %message.source.realm,
        )
    )]
    pub async fn receive(&self, message: Message) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);

        if let Err(result) = self.screen(&message) {
            self.reject(message, result).await;
            return;
        }

        let Some(message) = self.pending.complete(message) else {
            return;
        };
        self.dispatch(message).await;
    }

    async fn dispatch(&self, message: Message) {
        let registrations: Vec<Registration> = self
            .handlers
            .read()
            .get(&message.message_type)
            .cloned()
            .unwrap_or_default();

        if registrations.is_empty() {
            debug!("No handler for message type, dropped");
            return;
        }

        // Replies and errors are never answered.
        let answerable = !message.is_reply() && message.message_type != MessageType::Error;

        for registration in registrations {
            match registration.handler.handle(&message).await {
                Ok(Some(payload)) if answerable => {
                    let reply = message.reply(self.address(), payload);
                    self.send_detached(reply).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(handler = %registration.id, error = %e, "Message handler failed");
                    if message.message_type != MessageType::Error {
                        let reply = message.error_reply(self.address(), &e.to_string());
                        self.send_detached(reply).await;
                    }
                }
            }
        }
    }

    /// Apply the verify policy to an incoming message.
    fn screen(&self, message: &Message) -> Result<(), VerificationResult> {
        let policy = self.config.verify_policy;
        if !policy.enforces() {
            return Ok(());
        }
        let Some(key) = &self.config.bearer_key else {
            return Ok(());
        };

        match verify_message(message, key) {
            VerificationResult::Valid => self
                .replay
                .lock()
                .check_and_record(&message.id)
                .map_err(|e| {
                    debug!(error = %e, "Replay guard refused message");
                    let ReplayError::Reused { message_id } = e;
                    VerificationResult::ReplayDetected { message_id }
                }),
            VerificationResult::Unsigned if policy == VerifyPolicy::RequireSigned => {
                Err(VerificationResult::Unsigned)
            }
            VerificationResult::Unsigned => Ok(()),
            failure => Err(failure),
        }
    }

    async fn reject(&self, message: Message, result: VerificationResult) {
        warn!(result = %result, "Rejected incoming message");
        if message.is_reply() || message.message_type == MessageType::Error {
            return;
        }
        let reply = message.error_reply(self.address(), &format!("Verification failed: {result}"));
        self.send_detached(reply).await;
    }

    /// Check a message's signature against this router's key.
    ///
    /// A router without a key cannot authenticate anything: signed messages
    /// report `FingerprintMismatch`.
    #[must_use]
    pub fn verify(&self, message: &Message) -> VerificationResult {
        match &self.config.bearer_key {
            Some(key) => verify_message(message, key),
            None if message.is_signed() => VerificationResult::FingerprintMismatch,
            None => VerificationResult::Unsigned,
        }
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// Connect two routers in both directions.
    pub fn connect(self: &Arc<Self>, other: &Arc<Router>) {
        if other.realm == self.realm {
            warn!(realm = %self.realm, "Refusing to connect router to its own realm");
            return;
        }

        self.routers.insert(other.realm.clone(), other);
        other.routers.insert(self.realm.clone(), self);
        info!(realm = %self.realm, peer = %other.realm, "Routers connected");
    }

    /// Route messages for `realm` to an external sink.
    pub fn attach(&self, realm: impl Into<String>, sink: Arc<dyn MessageSink>) {
        let realm = realm.into();
        info!(realm = %self.realm, peer = %realm, "Sink attached");
        self.sinks.write().insert(realm, sink);
    }

    /// Drop the connection (or attached sink) for `realm`.
    ///
    /// Both sides of a router connection are removed, and every request
    /// either side has pending on the other fails with `Disconnected`.
    pub fn disconnect(&self, realm: &str) -> bool {
        if let Some(other) = self.routers.get(realm) {
            other.routers.remove(&self.realm);
            other.pending.fail_realm(&self.realm);
        }
        let was_router = self.routers.remove(realm);
        let was_sink = self.sinks.write().remove(realm).is_some();
        self.pending.fail_realm(realm);

        let removed = was_router || was_sink;
        if removed {
            info!(realm = %self.realm, peer = realm, "Disconnected");
        }
        removed
    }

    fn resolve(&self, realm: &str) -> Option<Arc<dyn MessageSink>> {
        if let Some(router) = self.routers.get(realm) {
            let sink: Arc<dyn MessageSink> = router;
            return Some(sink);
        }
        self.sinks.read().get(realm).cloned()
    }

    /// Every realm this router can deliver to, sorted.
    #[must_use]
    pub fn connected_realms(&self) -> Vec<String> {
        let mut realms = self.routers.realms();
        realms.extend(self.sinks.read().keys().cloned());
        realms.sort();
        realms.dedup();
        realms
    }

    /// True if messages for `realm` have a route.
    #[must_use]
    pub fn is_connected(&self, realm: &str) -> bool {
        self.routers.contains(realm) || self.sinks.read().contains_key(realm)
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Requests currently awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    /// Pending-slot statistics.
    #[must_use]
    pub fn pending_stats(&self) -> &PendingStats {
        self.pending.stats()
    }

    /// Messages handed to a sink.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Messages accepted by `receive`, rejected ones included.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageSink for Router {
    async fn deliver(&self, message: Message) {
        self.receive(message).await;
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("realm", &self.realm)
            .field("config", &self.config)
            .field("peers", &self.connected_realms())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
