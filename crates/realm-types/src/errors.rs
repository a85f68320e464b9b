//! # Error Types
//!
//! Errors shared by bus and router handlers.

use thiserror::Error;

/// Failure raised by an event or message handler.
///
/// The bus logs it; the router turns it into a `system.error` reply. It never
/// reaches the publisher or sender as an error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable description, copied into error replies.
    pub message: String,
}

impl HandlerError {
    /// Create a handler error from any displayable description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Payload error: {err}"))
    }
}
