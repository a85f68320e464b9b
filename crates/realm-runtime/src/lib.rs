//! # Realm Runtime
//!
//! Explicit construction of realm nodes, in place of process-wide
//! singletons.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`NodeConfig::from_env`)
//! 2. Initialize logging (`telemetry::init_logging`)
//! 3. Create nodes through a [`RealmDirectory`]
//! 4. Connect realms and register handlers
//!
//! ## Modules
//!
//! - `config` - `NodeConfig` and its environment loader
//! - `telemetry` - `tracing-subscriber` setup
//! - `node` - `RealmNode`, one bus + router pair
//! - `directory` - `RealmDirectory`, access-checked sends between nodes

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod directory;
pub mod node;
pub mod telemetry;

pub use config::{ConfigError, NodeConfig};
pub use directory::{DirectoryError, RealmDirectory};
pub use node::{RealmNode, ROUTER_CONNECTED, ROUTER_DISCONNECTED, SYSTEM_TAG};
pub use telemetry::{init_logging, TelemetryConfig, TelemetryError};
