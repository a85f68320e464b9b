//! # Realm Router - Signed Request/Response Messaging
//!
//! Every realm owns one [`Router`]. Routers connect to each other
//! symmetrically and exchange [`Message`]s addressed by realm name.
//!
//! ## Request/Response Flow
//!
//! ```text
//!  Router A                                          Router B
//!  ────────                                          ────────
//!  send(msg, wait=true)
//!    ├─ sign (if keyed)
//!    ├─ pending.register(msg.id)
//!    ├─ deliver ──────────────────────────────────►  receive(msg)
//!    │                                                 ├─ screen (verify policy)
//!    │                                                 ├─ handlers[msg.type] in order
//!    │                                                 └─ Ok(Some(p)) → reply(p)
//!  receive(reply) ◄───────────────────────────────────────┘
//!    └─ pending.complete(reply.reply_to) ──► send returns Some(reply)
//! ```
//!
//! ## Failure Model
//!
//! | Condition | Caller of `send` sees |
//! |-----------|-----------------------|
//! | Target not connected | `RouterError::NoTransport` |
//! | No reply in time | `RouterError::Timeout` (slot removed first) |
//! | Target disconnected mid-wait | `RouterError::Disconnected` |
//! | Same id already awaiting a reply | `RouterError::DuplicateRequest` |
//! | Handler error in target | a `system.error` reply |
//! | Verification failure in target | a `system.error` reply |
//!
//! Handler errors never reach the caller of `receive`.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod convenience;
pub mod errors;
pub mod handler;
pub mod pending;
pub mod router;
pub mod sink;

pub use config::{RouterConfig, UnknownVerifyPolicy, VerifyPolicy};
pub use errors::RouterError;
pub use handler::{handler_fn, HandlerId, MessageHandler};
pub use pending::{PendingStats, PendingStore};
pub use router::Router;
pub use sink::MessageSink;

pub use realm_types::{
    payload, BearerKey, HandlerError, Message, MessageType, Payload, RealmAddress,
    VerificationResult,
};

use std::time::Duration;

/// How long `send` waits for a reply unless configured otherwise.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
