//! # Access Control
//!
//! Contract for the lineage service that decides whether one realm may reach
//! another. The router never consults it; callers gate sensitive message
//! kinds before sending.

use std::collections::{HashMap, HashSet};

/// Lineage-based access decision.
pub trait AccessControl: Send + Sync {
    /// May `source` reach `target`, optionally for a named permission?
    fn can_access(&self, source: &str, target: &str, permission: Option<&str>) -> bool;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn can_access(&self, _source: &str, _target: &str, _permission: Option<&str>) -> bool {
        true
    }
}

/// Static lineage table.
///
/// A realm may always reach itself. An edge granted without permissions
/// allows every permission; an edge granted with permissions allows only
/// those (and permission-less access).
#[derive(Debug, Clone, Default)]
pub struct LineageAccess {
    edges: HashMap<(String, String), Option<HashSet<String>>>,
}

impl LineageAccess {
    /// Empty table: only self-access is allowed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `source` to reach `target` for any permission.
    #[must_use]
    pub fn allow(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.insert((source.into(), target.into()), None);
        self
    }

    /// Allow `source` to reach `target` for the listed permissions only.
    #[must_use]
    pub fn allow_with<I, S>(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        permissions: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let granted = permissions.into_iter().map(Into::into).collect();
        self.edges
            .insert((source.into(), target.into()), Some(granted));
        self
    }

    /// Allow both directions between two realms.
    #[must_use]
    pub fn allow_both(self, a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        self.allow(a.clone(), b.clone()).allow(b, a)
    }
}

impl AccessControl for LineageAccess {
    fn can_access(&self, source: &str, target: &str, permission: Option<&str>) -> bool {
        if source == target {
            return true;
        }
        match self.edges.get(&(source.to_string(), target.to_string())) {
            None => false,
            Some(None) => true,
            Some(Some(granted)) => permission.map_or(true, |p| granted.contains(p)),
        }
    }
}
