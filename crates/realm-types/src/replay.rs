//! # Replay Guard
//!
//! Rejects signed messages whose id has already been accepted.
//!
//! ## Window
//!
//! - Only id reuse is rejected; message timestamps are not checked
//! - Accepted ids are remembered for 120s from the moment they were accepted
//! - Expired ids are garbage-collected at most every 10s

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from replay checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The id was already accepted (replay attack).
    #[error("Message {message_id} has already been accepted (replay)")]
    Reused { message_id: String },
}

/// Time-bounded record of accepted message ids.
#[derive(Debug)]
pub struct ReplayGuard {
    /// Message id -> time it was accepted.
    seen: HashMap<String, DateTime<Utc>>,
    validity_window: Duration,
    gc_interval: Duration,
    last_gc: DateTime<Utc>,
}

impl ReplayGuard {
    /// How long accepted ids are remembered, in seconds.
    pub const DEFAULT_VALIDITY_WINDOW: i64 = 120;

    /// Minimum seconds between garbage collections.
    pub const DEFAULT_GC_INTERVAL: i64 = 10;

    /// Create a guard with the default window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_VALIDITY_WINDOW, Self::DEFAULT_GC_INTERVAL)
    }

    /// Create a guard with a custom validity window and gc interval (seconds).
    #[must_use]
    pub fn with_config(validity_window_secs: i64, gc_interval_secs: i64) -> Self {
        Self {
            seen: HashMap::new(),
            validity_window: Duration::seconds(validity_window_secs),
            gc_interval: Duration::seconds(gc_interval_secs),
            last_gc: Utc::now(),
        }
    }

    /// Record `message_id`, failing if it was already accepted inside the
    /// window.
    ///
    /// # Errors
    ///
    /// `ReplayError::Reused` if the id is still remembered.
    pub fn check_and_record(&mut self, message_id: &str) -> Result<(), ReplayError> {
        self.record_at(message_id, Utc::now())
    }

    fn record_at(&mut self, message_id: &str, now: DateTime<Utc>) -> Result<(), ReplayError> {
        if now - self.last_gc > self.gc_interval {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        if self.seen.contains_key(message_id) {
            return Err(ReplayError::Reused {
                message_id: message_id.to_string(),
            });
        }

        self.seen.insert(message_id.to_string(), now);
        Ok(())
    }

    /// True if the id was recorded and not yet collected.
    #[must_use]
    pub fn contains(&self, message_id: &str) -> bool {
        self.seen.contains_key(message_id)
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn garbage_collect(&mut self, now: DateTime<Utc>) {
        let expiry = now - self.validity_window;
        self.seen.retain(|_, accepted| *accepted > expiry);
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}
