//! Event entries.

use crate::key::EventKey;
use crate::listener::{Listener, ListenerIdentity};
use crate::payload::Payload;
use crate::pinned::PinnedData;
use crate::scope::{ScopeHandle, ScopeId};

/// Record for one domain + event key.
pub struct EventEntry {
    key: EventKey,
    pub(crate) pinned: bool,
    pub(crate) pinned_data: Option<PinnedData>,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) scope: Option<ScopeHandle>,
}

impl EventEntry {
    pub fn new(key: EventKey, pinned: bool) -> Self {
        Self {
            key,
            pinned,
            pinned_data: None,
            listeners: Vec::new(),
            scope: None,
        }
    }

    pub fn key(&self) -> &EventKey {
        &self.key
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn pinned_data(&self) -> Option<&PinnedData> {
        self.pinned_data.as_ref()
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn scope_id(&self) -> Option<ScopeId> {
        self.scope.as_ref().map(|scope| scope.scope_id())
    }

    pub fn contains(&self, identity: &ListenerIdentity) -> bool {
        self.listeners.iter().any(|l| l.identity() == *identity)
    }

    /// Remove every listener matching `identity`. Returns how many went.
    pub fn remove(&mut self, identity: &ListenerIdentity) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.identity() != *identity);
        before - self.listeners.len()
    }

    /// Replace the pinned snapshot with a fresh copy of `payload`, unless the
    /// entry is already pinned to an equal value.
    pub(crate) fn pin(&mut self, payload: &Payload) {
        let unchanged = self.pinned
            && self
                .pinned_data
                .as_ref()
                .and_then(PinnedData::payload)
                .is_some_and(|current| current == payload);
        if !unchanged {
            self.release_pinned();
            self.pinned_data = Some(PinnedData::capture(payload));
        }
        self.pinned = true;
    }

    /// Snapshot to replay to a new listener, if the entry is pinned.
    pub(crate) fn replay_payload(&self) -> Option<Payload> {
        if !self.pinned {
            return None;
        }
        self.pinned_data
            .as_ref()
            .and_then(PinnedData::payload)
            .cloned()
    }

    pub(crate) fn release_pinned(&mut self) {
        if let Some(mut data) = self.pinned_data.take() {
            data.release();
        }
    }
}
