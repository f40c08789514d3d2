//! User-specific permission grants and denials.
//!
//! A [`PermissionSet`] only knows what was explicitly granted or denied to
//! one account. Anything it has no opinion on is answered by the account's
//! group, see [`PermissionSet::has_permission`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::group::GroupDefaults;

/// Prefix marking a denial in the host's permission entry syntax.
pub const NEGATION_PREFIX: char = '!';

/// Answer of the user-specific layer for one permission name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny,
    /// No explicit entry; the group decides.
    Defer,
}

impl PermissionDecision {
    /// Whether the user layer answered on its own.
    pub fn is_explicit(self) -> bool {
        !matches!(self, PermissionDecision::Defer)
    }

    /// Final answer, asking `group` only when the user layer deferred.
    pub fn or_group<G>(self, group: &G, name: &str) -> bool
    where
        G: GroupDefaults + ?Sized,
    {
        match self {
            PermissionDecision::Allow => true,
            PermissionDecision::Deny => false,
            PermissionDecision::Defer => group.has_permission(name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    grants: BTreeSet<String>,
    denials: BTreeSet<String>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw persisted collections.
    ///
    /// No normalization happens here: a name present in both collections is
    /// kept as is and resolved by [`decide`](Self::decide) as a denial.
    pub fn from_parts<G, D>(grants: G, denials: D) -> Self
    where
        G: IntoIterator<Item = String>,
        D: IntoIterator<Item = String>,
    {
        Self {
            grants: grants.into_iter().collect(),
            denials: denials.into_iter().collect(),
        }
    }

    /// Grant `name`, dropping any denial of it.
    pub fn grant(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let was_denied = self.denials.remove(&name);
        self.grants.insert(name) || was_denied
    }

    /// Deny `name`, dropping any grant of it.
    pub fn deny(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let was_granted = self.grants.remove(&name);
        self.denials.insert(name) || was_granted
    }

    /// Forget everything about `name`. Returns whether anything changed.
    pub fn revoke(&mut self, name: &str) -> bool {
        let granted = self.grants.remove(name);
        let denied = self.denials.remove(name);
        granted || denied
    }

    /// Apply one entry in the host syntax: `"name"` grants, `"!name"` denies.
    pub fn apply_entry(&mut self, entry: &str) -> bool {
        match entry.strip_prefix(NEGATION_PREFIX) {
            Some(name) => self.deny(name),
            None => self.grant(entry),
        }
    }

    /// The user-specific answer for `name`. Denial wins over grant.
    pub fn decide(&self, name: &str) -> PermissionDecision {
        if self.denials.contains(name) {
            PermissionDecision::Deny
        } else if self.grants.contains(name) {
            PermissionDecision::Allow
        } else {
            PermissionDecision::Defer
        }
    }

    /// Full check: the user layer first, the group for everything else.
    pub fn has_permission<G>(&self, group: &G, name: &str) -> bool
    where
        G: GroupDefaults + ?Sized,
    {
        self.decide(name).or_group(group, name)
    }

    pub fn grants(&self) -> impl Iterator<Item = &str> {
        self.grants.iter().map(String::as_str)
    }

    pub fn denials(&self) -> impl Iterator<Item = &str> {
        self.denials.iter().map(String::as_str)
    }

    /// Entries in host syntax: grants first, then `!`-prefixed denials.
    pub fn entries(&self) -> Vec<String> {
        self.grants
            .iter()
            .cloned()
            .chain(self.denials.iter().map(|d| format!("{NEGATION_PREFIX}{d}")))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.denials.is_empty()
    }
}
