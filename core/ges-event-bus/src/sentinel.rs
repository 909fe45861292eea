//! Per-scope teardown sentinels.

use std::collections::HashSet;

use crate::scope::{ScopeHandle, ScopeId, TeardownHook};

/// Tracks which event keys were created under one scope.
///
/// The registry holds one sentinel per live scope. The sentinel's hook on the
/// scope fires at teardown, and the registry then deletes every tracked key
/// and drops the sentinel.
#[derive(Debug)]
pub struct ScopeSentinel {
    scope_id: ScopeId,
    label: String,
    keys: HashSet<String>,
}

impl ScopeSentinel {
    /// Install `hook` on `scope`. `None` if the scope is already torn down.
    pub fn watch(scope: &ScopeHandle, hook: TeardownHook) -> Option<Self> {
        if !scope.on_teardown(hook) {
            return None;
        }
        Some(Self {
            scope_id: scope.scope_id(),
            label: scope.describe(),
            keys: HashSet::new(),
        })
    }

    pub fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true if the key was not tracked yet.
    pub fn track(&mut self, lookup: &str) -> bool {
        self.keys.insert(lookup.to_string())
    }

    pub fn untrack(&mut self, lookup: &str) -> bool {
        self.keys.remove(lookup)
    }

    pub fn contains(&self, lookup: &str) -> bool {
        self.keys.contains(lookup)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Take every tracked key, leaving the sentinel empty.
    pub fn drain(&mut self) -> Vec<String> {
        self.keys.drain().collect()
    }
}
