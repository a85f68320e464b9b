//! # Subscriptions
//!
//! A subscription pairs an [`EventHandler`] with an [`EventFilter`]. The
//! same filter drives live dispatch and history queries.

use crate::pattern::NamePattern;
use async_trait::async_trait;
use realm_types::{Event, HandlerError, Tags};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Handler invoked for every matching event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are logged by the bus and go no further.
    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into an [`EventHandler`].
struct FnEventHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnEventHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        (self.0)(event.clone()).await
    }
}

/// Wrap an async closure as a shareable event handler.
///
/// ```rust,ignore
/// let handler = event_handler_fn(|event| async move {
///     tracing::info!(name = %event.name, "seen");
///     Ok(())
/// });
/// ```
pub fn event_handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnEventHandler(f))
}

/// Opaque subscription identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// String form of the id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which events a subscription (or history query) accepts.
///
/// All conditions are ANDed: name pattern, then source realm (if set), then
/// tag overlap (if any tags are set).
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Pattern as given.
    pub pattern: String,
    compiled: NamePattern,
    /// Required source realm.
    pub realm: Option<String>,
    /// At least one of these tags must be present. Empty means no tag check.
    pub tags: Tags,
}

impl EventFilter {
    /// Accept every event.
    #[must_use]
    pub fn all() -> Self {
        Self::pattern("*")
    }

    /// Accept events whose name matches `pattern`.
    #[must_use]
    pub fn pattern(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            compiled: NamePattern::parse(&pattern),
            pattern,
            realm: None,
            tags: Tags::new(),
        }
    }

    /// Additionally require the event to come from `realm`.
    #[must_use]
    pub fn from_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Additionally require at least one of `tags`.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if !self.compiled.matches(&event.name) {
            return false;
        }

        let realm_match = self
            .realm
            .as_deref()
            .map_or(true, |realm| realm == event.source_realm);

        let tag_match = self.tags.is_empty() || event.has_any_tag(&self.tags);

        realm_match && tag_match
    }
}

/// A registered handler and its filter. Owned by one bus.
pub struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: Arc<dyn EventHandler>,
}

impl Subscription {
    pub(crate) fn new(filter: EventFilter, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            id: SubscriptionId::generate(),
            filter,
            handler,
        }
    }

    /// Subscription id.
    #[must_use]
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Check if an event should be delivered to this subscription.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.filter.matches(event)
    }

    pub(crate) fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
