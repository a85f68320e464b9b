//! # Message Handlers
//!
//! Handlers are registered per [`MessageType`](realm_types::MessageType).
//! Returning `Ok(Some(payload))` for a request makes the router answer it
//! with `payload`; returning `Err` makes it answer with `system.error`.

use async_trait::async_trait;
use realm_types::{HandlerError, Message, Payload};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Handler invoked for every message of the type it was registered for.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one message.
    async fn handle(&self, message: &Message) -> Result<Option<Payload>, HandlerError>;
}

struct FnMessageHandler<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for FnMessageHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Payload>, HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: &Message) -> Result<Option<Payload>, HandlerError> {
        (self.0)(message.clone()).await
    }
}

/// Wrap an async closure as a shareable message handler.
///
/// ```rust,ignore
/// router.on(MessageType::KaitiakiRequest, handler_fn(|msg| async move {
///     Ok(Some(payload(json!({"result": "ok"}))))
/// }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Payload>, HandlerError>> + Send + 'static,
{
    Arc::new(FnMessageHandler(f))
}

/// Identifies one registration, for targeted removal with `Router::off`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId(String);

impl HandlerId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// String form of the id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A handler together with its registration id.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) id: HandlerId,
    pub(crate) handler: Arc<dyn MessageHandler>,
}
