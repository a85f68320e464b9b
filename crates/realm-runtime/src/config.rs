//! # Node Configuration
//!
//! Everything needed to construct one realm's bus and router.
//!
//! ## Environment
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `REALM_NAME` | (required) | Realm this node speaks for |
//! | `REALM_BEARER_KEY` | unset | Shared signing secret |
//! | `REALM_MAX_HISTORY` | `1000` | Event history bound |
//! | `REALM_RESPONSE_TIMEOUT_MS` | `30000` | Reply timeout for `send` |
//! | `REALM_VERIFY_POLICY` | `reject_invalid` | `manual`, `reject_invalid` or `require_signed` |
//! | `REALM_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `REALM_JSON_LOGS` | `false` | JSON log output |

use crate::telemetry::TelemetryConfig;
use realm_bus::BusConfig;
use realm_router::{BearerKey, RouterConfig, VerifyPolicy};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No realm name was provided.
    #[error("Realm name is not set. Set REALM_NAME or provide it in config.")]
    MissingRealm,

    /// A variable was set to something unparsable.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The bearer key is present but empty.
    #[error("Bearer key is empty")]
    EmptyBearerKey,

    /// Replies could never arrive in time.
    #[error("Response timeout must be greater than zero")]
    ZeroTimeout,

    /// `require_signed` cannot verify anything without a key.
    #[error("Verify policy require_signed needs a bearer key")]
    PolicyWithoutKey,
}

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Realm this node speaks for.
    pub realm: String,
    /// Event bus configuration.
    pub bus: BusConfig,
    /// Message router configuration.
    pub router: RouterConfig,
    /// Logging configuration.
    pub telemetry: TelemetryConfig,
}

impl NodeConfig {
    /// Default configuration for `realm`.
    #[must_use]
    pub fn for_realm(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            ..Self::default()
        }
    }

    /// Load and validate configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; `MissingRealm` when `REALM_NAME` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let realm = lookup("REALM_NAME")
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        let mut config = Self::for_realm(realm);

        if let Some(raw) = lookup("REALM_MAX_HISTORY") {
            config.bus.max_history = parse_number("REALM_MAX_HISTORY", &raw)?;
        }

        if let Some(raw) = lookup("REALM_RESPONSE_TIMEOUT_MS") {
            let millis: u64 = parse_number("REALM_RESPONSE_TIMEOUT_MS", &raw)?;
            config.router.response_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup("REALM_VERIFY_POLICY") {
            config.router.verify_policy =
                raw.parse::<VerifyPolicy>()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: "REALM_VERIFY_POLICY",
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
        }

        if let Some(secret) = lookup("REALM_BEARER_KEY") {
            config.router.bearer_key = Some(BearerKey::from(secret));
        }

        config.telemetry = TelemetryConfig::from_lookup(&lookup);
        config.telemetry.service_name = format!("realm-node-{}", config.realm);

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration can build a working node.
    ///
    /// # Errors
    ///
    /// - `MissingRealm`: realm name is blank
    /// - `EmptyBearerKey`: key set to an empty string
    /// - `ZeroTimeout`: response timeout is zero
    /// - `PolicyWithoutKey`: `require_signed` without a key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.trim().is_empty() {
            return Err(ConfigError::MissingRealm);
        }
        if self.router.bearer_key.as_ref().is_some_and(BearerKey::is_empty) {
            return Err(ConfigError::EmptyBearerKey);
        }
        if self.router.response_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.router.verify_policy == VerifyPolicy::RequireSigned
            && self.router.bearer_key.is_none()
        {
            return Err(ConfigError::PolicyWithoutKey);
        }
        Ok(())
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_realm_is_an_error() {
        assert_eq!(
            NodeConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::MissingRealm
        );
        assert_eq!(
            NodeConfig::from_lookup(lookup(&[("REALM_NAME", "  ")])).unwrap_err(),
            ConfigError::MissingRealm
        );
    }

    #[test]
    fn test_defaults_for_realm() {
        let config = NodeConfig::from_lookup(lookup(&[("REALM_NAME", "alpha")])).unwrap();
        assert_eq!(config.realm, "alpha");
        assert_eq!(config.bus.max_history, 1000);
        assert_eq!(config.router.response_timeout, Duration::from_secs(30));
        assert!(config.router.bearer_key.is_none());
        assert_eq!(config.router.verify_policy, VerifyPolicy::RejectInvalid);
        assert_eq!(config.telemetry.service_name, "realm-node-alpha");
    }

    #[test]
    fn test_all_variables_are_read() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("REALM_NAME", "alpha"),
            ("REALM_BEARER_KEY", "s3cret"),
            ("REALM_MAX_HISTORY", "50"),
            ("REALM_RESPONSE_TIMEOUT_MS", "250"),
            ("REALM_VERIFY_POLICY", "require_signed"),
            ("REALM_LOG_LEVEL", "debug"),
            ("REALM_JSON_LOGS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.bus.max_history, 50);
        assert_eq!(config.router.response_timeout, Duration::from_millis(250));
        assert_eq!(config.router.bearer_key, Some(BearerKey::from("s3cret")));
        assert_eq!(config.router.verify_policy, VerifyPolicy::RequireSigned);
        assert_eq!(config.telemetry.log_level, "debug");
        assert!(config.telemetry.json_logs);
    }

    #[test]
    fn test_unparsable_values_name_the_variable() {
        let err = NodeConfig::from_lookup(lookup(&[
            ("REALM_NAME", "alpha"),
            ("REALM_MAX_HISTORY", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "REALM_MAX_HISTORY", .. }));

        let err = NodeConfig::from_lookup(lookup(&[
            ("REALM_NAME", "alpha"),
            ("REALM_VERIFY_POLICY", "paranoid"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "REALM_VERIFY_POLICY", .. }));
    }

    #[test]
    fn test_validation_rules() {
        let mut config = NodeConfig::for_realm("alpha");
        assert!(config.validate().is_ok());

        config.router.response_timeout = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));

        let mut config = NodeConfig::for_realm("alpha");
        config.router.verify_policy = VerifyPolicy::RequireSigned;
        assert_eq!(config.validate(), Err(ConfigError::PolicyWithoutKey));

        config.router.bearer_key = Some(BearerKey::from(""));
        assert_eq!(config.validate(), Err(ConfigError::EmptyBearerKey));
    }
}
