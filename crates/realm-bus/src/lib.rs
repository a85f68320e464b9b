//! # Realm Bus - Event Bus for Inter-Realm Notifications
//!
//! Every realm owns one [`EventBus`]. Publishing fans an [`Event`] out to the
//! bus's own subscribers and then forwards it once to every directly
//! connected bus.
//!
//! ```text
//! ┌──────────────┐    publish()    ┌──────────────┐   receive()   ┌──────────────┐
//! │ Subscriber A │ ◄────────────── │  Bus (alpha) │ ────────────► │  Bus (beta)  │
//! └──────────────┘                 └──────────────┘               └──────┬───────┘
//!                                                                        │ local only
//!                                                                        ▼
//!                                                                 ┌──────────────┐
//!                                                                 │ Subscriber B │
//!                                                                 └──────────────┘
//! ```
//!
//! ## Rules
//!
//! - Subscribers run in registration order; a failing handler is logged and
//!   skipped, never aborting the publish.
//! - Propagation is one hop: a bus that receives a forwarded event dispatches
//!   it locally and does not forward it again.
//! - History is a FIFO ring bounded by [`BusConfig::max_history`].

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bus;
pub mod history;
pub mod pattern;
pub mod subscription;

pub use bus::{BusConfig, EventBus};
pub use history::EventHistory;
pub use pattern::NamePattern;
pub use subscription::{event_handler_fn, EventFilter, EventHandler, Subscription, SubscriptionId};

pub use realm_types::{tags, Event, HandlerError, Payload, Tags};

/// Default bound on the per-bus event history.
pub const DEFAULT_MAX_HISTORY: usize = 1000;
