//! Router configuration.

use crate::DEFAULT_RESPONSE_TIMEOUT;
use realm_types::BearerKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What the router checks on every incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyPolicy {
    /// Never verify on receipt. Callers use `Router::verify` themselves.
    Manual,
    /// Verify signed messages and reject failures. Unsigned messages pass.
    #[default]
    RejectInvalid,
    /// As `RejectInvalid`, and unsigned messages are rejected too.
    RequireSigned,
}

impl VerifyPolicy {
    /// True if incoming signatures are checked.
    #[must_use]
    pub fn enforces(&self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Config string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::RejectInvalid => "reject_invalid",
            Self::RequireSigned => "require_signed",
        }
    }
}

impl fmt::Display for VerifyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized verify policy string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown verify policy '{0}' (expected manual, reject_invalid or require_signed)")]
pub struct UnknownVerifyPolicy(pub String);

impl FromStr for VerifyPolicy {
    type Err = UnknownVerifyPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "manual" => Ok(Self::Manual),
            "reject_invalid" => Ok(Self::RejectInvalid),
            "require_signed" => Ok(Self::RequireSigned),
            _ => Err(UnknownVerifyPolicy(s.to_string())),
        }
    }
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// How long `send` waits for a correlated reply.
    pub response_timeout: Duration,
    /// Signing secret. Outgoing messages are signed iff this is set.
    pub bearer_key: Option<BearerKey>,
    /// Incoming verification policy. Only applies when a key is set.
    pub verify_policy: VerifyPolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            bearer_key: None,
            verify_policy: VerifyPolicy::default(),
        }
    }
}

impl RouterConfig {
    /// Set the signing key.
    #[must_use]
    pub fn with_bearer_key(mut self, key: BearerKey) -> Self {
        self.bearer_key = Some(key);
        self
    }

    /// Set the reply timeout.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the verification policy.
    #[must_use]
    pub fn with_verify_policy(mut self, policy: VerifyPolicy) -> Self {
        self.verify_policy = policy;
        self
    }
}
