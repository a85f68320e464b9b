//! # Name Patterns
//!
//! Event-name matching for subscriptions and history queries.
//!
//! | Pattern | Rule |
//! |---------|------|
//! | `*` | matches every name |
//! | no `*` | exact equality |
//! | one `*` (`prefix*suffix`) | starts with prefix, ends with suffix |
//! | anything else | glob match |

use std::fmt;

/// Compiled event-name pattern.
#[derive(Clone)]
pub enum NamePattern {
    /// `*`
    Any,
    /// No wildcard.
    Exact(String),
    /// Exactly one `*`.
    Affix { prefix: String, suffix: String },
    /// Several wildcards.
    Glob(glob::Pattern),
}

impl NamePattern {
    /// Compile a pattern. Never fails: a pattern that is not a valid glob
    /// is matched literally.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            return Self::Any;
        }

        match pattern.matches('*').count() {
            0 => Self::Exact(pattern.to_string()),
            1 => {
                let (prefix, suffix) = pattern.split_once('*').unwrap_or((pattern, ""));
                Self::Affix {
                    prefix: prefix.to_string(),
                    suffix: suffix.to_string(),
                }
            }
            _ => match glob::Pattern::new(pattern) {
                Ok(compiled) => Self::Glob(compiled),
                Err(_) => Self::Exact(pattern.to_string()),
            },
        }
    }

    /// Does `name` match?
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => exact == name,
            Self::Affix { prefix, suffix } => {
                name.len() >= prefix.len() + suffix.len()
                    && name.starts_with(prefix.as_str())
                    && name.ends_with(suffix.as_str())
            }
            Self::Glob(compiled) => compiled.matches(name),
        }
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Exact(exact) => write!(f, "Exact({exact:?})"),
            Self::Affix { prefix, suffix } => write!(f, "Affix({prefix:?}*{suffix:?})"),
            Self::Glob(compiled) => write!(f, "Glob({:?})", compiled.as_str()),
        }
    }
}
