//! Event registry and dispatch engine
//!
//! ```text
//! emit(key, payload, pinned, scope)
//!   ├─► scope invalid/absent ─► delete entry, Err(InvalidScope | MissingScope)
//!   ├─► collection payload   ─► Err(UnsupportedPayload)
//!   ├─► [lock] get-or-create entry, tag scope sentinel, pin transition,
//!   │          snapshot listeners                                 [unlock]
//!   ├─► for each listener (copied):
//!   │     owner dead        ─► defer to stale batch
//!   │     function missing  ─► skip (logged)
//!   │     type mismatch     ─► skip (logged)
//!   │     else              ─► invoke
//!   └─► [lock] remove stale batch from entry + owner index      [unlock]
//! ```
//!
//! No registry lock is held while a receiver runs, so receivers may emit,
//! subscribe or unsubscribe re-entrantly. Listeners added during a dispatch
//! are not called by that dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::callable::Callable;
use crate::entry::EventEntry;
use crate::error::BusError;
use crate::host::{ObjectHost, ObjectId};
use crate::key::EventKey;
use crate::listener::{lambda_identity, Listener, ListenerIdentity};
use crate::options::BusOptions;
use crate::payload::Payload;
use crate::scope::{ScopeHandle, ScopeId, TeardownHook};
use crate::sentinel::ScopeSentinel;

/// Per-key dispatch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub emitted: u64,
    pub replayed: u64,
    pub delivered: u64,
    pub skipped: u64,
    pub stale_removed: u64,
    /// Wall-clock time of the last emit or replay (nanoseconds).
    pub last_emit_ns: i64,
}

#[derive(Default)]
struct RegistryState {
    /// Lookup string ("domain.event") -> entry
    events: HashMap<String, EventEntry>,
    /// Owner -> (lookup, listener) pairs, for bulk unsubscribe
    owners: HashMap<ObjectId, Vec<(String, ListenerIdentity)>>,
    /// Live scope -> sentinel tracking the keys created under it
    scopes: HashMap<ScopeId, ScopeSentinel>,
}

impl RegistryState {
    fn entry_or_create(&mut self, key: &EventKey, lookup: &str) -> &mut EventEntry {
        self.events.entry(lookup.to_string()).or_insert_with(|| {
            debug!(key = %lookup, "creating event");
            EventEntry::new(key.clone(), false)
        })
    }

    /// Remove an entry and every index reference to it, releasing its pin.
    fn remove_entry(&mut self, lookup: &str) -> Option<EventEntry> {
        let mut entry = self.events.remove(lookup)?;
        for listener in entry.listeners() {
            let identity = listener.identity();
            self.unindex_owner(&identity, lookup);
        }
        if let Some(scope_id) = entry.scope_id() {
            if let Some(sentinel) = self.scopes.get_mut(&scope_id) {
                sentinel.untrack(lookup);
            }
        }
        entry.release_pinned();
        Some(entry)
    }

    fn index_owner(&mut self, lookup: &str, identity: ListenerIdentity) {
        let slot = self.owners.entry(identity.owner).or_default();
        if !slot.iter().any(|(k, id)| k == lookup && *id == identity) {
            slot.push((lookup.to_string(), identity));
        }
    }

    fn unindex_owner(&mut self, identity: &ListenerIdentity, lookup: &str) {
        if let Some(slot) = self.owners.get_mut(&identity.owner) {
            slot.retain(|(k, id)| !(k == lookup && id == identity));
            if slot.is_empty() {
                self.owners.remove(&identity.owner);
            }
        }
    }

    /// Associate `lookup` with `scope`, creating the scope's sentinel on
    /// first use. Returns false if the scope refused the teardown hook.
    fn tag_scope(&mut self, lookup: &str, scope: &ScopeHandle, registry: Weak<RegistryInner>) -> bool {
        let scope_id = scope.scope_id();
        if !self.scopes.contains_key(&scope_id) {
            let hook: TeardownHook = Box::new(move |id| {
                if let Some(inner) = registry.upgrade() {
                    EventRegistry { inner }.handle_scope_teardown(id);
                }
            });
            match ScopeSentinel::watch(scope, hook) {
                Some(sentinel) => {
                    debug!(scope = %sentinel.label(), "watching scope");
                    self.scopes.insert(scope_id, sentinel);
                }
                None => return false,
            }
        }

        let previous = match self.events.get_mut(lookup) {
            Some(entry) => {
                let previous = entry.scope_id();
                entry.scope = Some(Arc::clone(scope));
                previous
            }
            None => return false,
        };
        if let Some(previous) = previous.filter(|id| *id != scope_id) {
            if let Some(sentinel) = self.scopes.get_mut(&previous) {
                sentinel.untrack(lookup);
            }
        }
        if let Some(sentinel) = self.scopes.get_mut(&scope_id) {
            sentinel.track(lookup);
        }
        true
    }
}

struct RegistryInner {
    host: Arc<dyn ObjectHost>,
    state: Mutex<RegistryState>,
    options: RwLock<BusOptions>,
    stats: DashMap<String, EventStats>,
}

/// String-keyed event registry.
///
/// Cheap to clone; clones share the same table. Construct one per
/// application (or per test) and pass it to whoever needs it.
#[derive(Clone)]
pub struct EventRegistry {
    inner: Arc<RegistryInner>,
}

impl EventRegistry {
    pub fn new(host: Arc<dyn ObjectHost>) -> Self {
        Self::with_options(host, BusOptions::default())
    }

    pub fn with_options(host: Arc<dyn ObjectHost>, options: BusOptions) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                host,
                state: Mutex::new(RegistryState::default()),
                options: RwLock::new(options),
                stats: DashMap::new(),
            }),
        }
    }

    pub fn host(&self) -> &Arc<dyn ObjectHost> {
        &self.inner.host
    }

    // ========== Options ==========

    /// Replace the global options. Takes effect for the next decision made.
    pub fn set_options(&self, options: BusOptions) {
        *self.inner.options.write() = options;
    }

    pub fn options(&self) -> BusOptions {
        *self.inner.options.read()
    }

    // ========== Events ==========

    /// Create (or overwrite) the entry for `key`.
    ///
    /// An existing entry is replaced: its listeners and pinned data are
    /// discarded.
    pub fn create_event(&self, key: &EventKey, pinned: bool) {
        let lookup = key.as_lookup();
        let previous = {
            let mut state = self.inner.state.lock();
            let previous = state.remove_entry(&lookup);
            state
                .events
                .insert(lookup.clone(), EventEntry::new(key.clone(), pinned));
            previous
        };
        if let Some(previous) = previous {
            self.inner.stats.remove(&lookup);
            debug!(
                key = %lookup,
                discarded = previous.listener_count(),
                "event recreated, previous listeners discarded"
            );
        }
    }

    pub fn has_event(&self, key: &EventKey) -> bool {
        self.inner.state.lock().events.contains_key(&key.as_lookup())
    }

    /// Delete the entry for `key`. Returns false if there was none.
    pub fn delete_event(&self, key: &EventKey) -> bool {
        self.delete_event_by_lookup(&key.as_lookup())
    }

    /// Delete by the full `"domain.event"` lookup string.
    pub fn delete_event_by_lookup(&self, lookup: &str) -> bool {
        let removed = self.inner.state.lock().remove_entry(lookup);
        match removed {
            Some(_) => {
                self.inner.stats.remove(lookup);
                debug!(key = %lookup, "event deleted");
                true
            }
            None => false,
        }
    }

    /// Clear the pin flag. The last snapshot is kept until it is overwritten
    /// or the entry is deleted.
    pub fn unpin_event(&self, key: &EventKey) {
        let lookup = key.as_lookup();
        let mut state = self.inner.state.lock();
        match state.events.get_mut(&lookup) {
            Some(entry) => entry.pinned = false,
            None => debug!(key = %lookup, "unpin of unknown event ignored"),
        }
    }

    pub fn is_pinned(&self, key: &EventKey) -> bool {
        self.inner
            .state
            .lock()
            .events
            .get(&key.as_lookup())
            .map(EventEntry::is_pinned)
            .unwrap_or(false)
    }

    /// Retained snapshot of `key`, whether or not the entry is still pinned.
    pub fn pinned_payload(&self, key: &EventKey) -> Option<Payload> {
        self.inner
            .state
            .lock()
            .events
            .get(&key.as_lookup())
            .and_then(EventEntry::pinned_data)
            .and_then(|data| data.payload().cloned())
    }

    pub fn listener_count(&self, key: &EventKey) -> usize {
        self.inner
            .state
            .lock()
            .events
            .get(&key.as_lookup())
            .map(EventEntry::listener_count)
            .unwrap_or(0)
    }

    pub fn event_count(&self) -> usize {
        self.inner.state.lock().events.len()
    }

    /// Number of scopes with a live sentinel.
    pub fn scope_count(&self) -> usize {
        self.inner.state.lock().scopes.len()
    }

    /// Number of subscriptions tracked for `owner`.
    pub fn subscription_count(&self, owner: ObjectId) -> usize {
        self.inner
            .state
            .lock()
            .owners
            .get(&owner)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn stats(&self, key: &EventKey) -> Option<EventStats> {
        self.inner
            .stats
            .get(&key.as_lookup())
            .map(|stats| stats.value().clone())
    }

    /// Drop every entry and index.
    ///
    /// Sentinels are emptied but stay registered, so a scope that keeps
    /// emitting after a clear reuses its existing teardown hook.
    pub fn clear(&self) {
        let events = {
            let mut state = self.inner.state.lock();
            state.owners.clear();
            for sentinel in state.scopes.values_mut() {
                sentinel.drain();
            }
            std::mem::take(&mut state.events)
        };
        let count = events.len();
        for (_, mut entry) in events {
            entry.release_pinned();
        }
        self.inner.stats.clear();
        info!(events = count, "registry cleared");
    }

    // ========== Subscribe ==========

    /// Subscribe `listener` to `key`, creating the entry if needed.
    ///
    /// Returns false if the listener is rejected. A pinned entry replays its
    /// snapshot to the new listener before this returns.
    pub fn subscribe(&self, key: &EventKey, listener: Listener) -> bool {
        self.add_listener(key, listener, None, true)
    }

    /// Like [`subscribe`](Self::subscribe), also associating the entry with
    /// `scope` so it is deleted when the scope is torn down.
    pub fn subscribe_scoped(&self, key: &EventKey, listener: Listener, scope: &ScopeHandle) -> bool {
        self.add_listener(key, listener, Some(scope), true)
    }

    /// Subscribe a closure owned by `owner`. Returns the identity string to
    /// pass to [`unsubscribe_lambda`](Self::unsubscribe_lambda).
    pub fn subscribe_lambda(&self, key: &EventKey, owner: ObjectId, callable: Callable) -> Option<String> {
        let id = lambda_identity(owner, &callable);
        self.subscribe(key, Listener::lambda(owner, callable))
            .then_some(id)
    }

    fn add_listener(
        &self,
        key: &EventKey,
        listener: Listener,
        scope: Option<&ScopeHandle>,
        allow_retry: bool,
    ) -> bool {
        let lookup = key.as_lookup();
        {
            let mut state = self.inner.state.lock();
            state.entry_or_create(key, &lookup);
        }

        let mut linked = listener.clone();
        if let Err(err) = linked.link(self.inner.host.as_ref()) {
            match &err {
                BusError::DeadOwner { owner } => warn!(
                    key = %lookup,
                    owner = %owner,
                    function = listener.function_name().unwrap_or("-"),
                    "(invalid object) cannot bind to event"
                ),
                _ => warn!(key = %lookup, error = %err, "listener rejected"),
            }
            return false;
        }

        let identity = linked.identity();
        let registry = Arc::downgrade(&self.inner);
        let replay = {
            let mut state = self.inner.state.lock();
            // a receiver may have deleted the entry since the first lock
            state.entry_or_create(key, &lookup);
            if let Some(scope) = scope.filter(|scope| scope.is_valid()) {
                state.tag_scope(&lookup, scope, registry);
            }
            let Some(entry) = state.events.get_mut(&lookup) else {
                return false;
            };
            if entry.contains(&identity) {
                debug!(key = %lookup, listener = %identity, "already subscribed");
                return true;
            }
            entry.listeners.push(linked.clone());
            let replay = entry
                .replay_payload()
                .map(|payload| (payload, entry.scope.clone()));
            state.index_owner(&lookup, identity);
            replay
        };

        let Some((payload, entry_scope)) = replay else {
            return true;
        };
        match self.dispatch(key, &payload, true, entry_scope.as_ref(), Some(&linked)) {
            Ok(_) => true,
            Err(err) if err.is_scope_failure() && allow_retry => {
                debug!(key = %lookup, "pinned event outlived its scope, resubscribing");
                self.add_listener(key, listener, scope, false)
            }
            // still subscribed; the failed replay was logged by dispatch
            Err(_) => true,
        }
    }

    // ========== Unsubscribe ==========

    pub fn unsubscribe(&self, key: &EventKey, listener: &Listener) -> bool {
        self.unsubscribe_identity(key, &listener.identity())
    }

    pub fn unsubscribe_lambda(&self, key: &EventKey, owner: ObjectId, id: &str) -> bool {
        self.unsubscribe_identity(key, &ListenerIdentity::lambda(owner, id))
    }

    /// Remove the subscription matching `identity`. Returns false if nothing
    /// was removed.
    pub fn unsubscribe_identity(&self, key: &EventKey, identity: &ListenerIdentity) -> bool {
        match self.remove_listener(key, identity) {
            Some(removed) => removed > 0,
            None => {
                warn!(key = %key, "tried to remove a listener from an event that doesn't exist, ignored");
                false
            }
        }
    }

    /// Unsubscribe without diagnostics; `None` when the entry is gone.
    pub(crate) fn remove_listener(&self, key: &EventKey, identity: &ListenerIdentity) -> Option<usize> {
        let lookup = key.as_lookup();
        let mut state = self.inner.state.lock();
        let removed = state.events.get_mut(&lookup)?.remove(identity);
        state.unindex_owner(identity, &lookup);
        Some(removed)
    }

    /// Remove every subscription held by `owner`. Returns how many listeners
    /// were removed.
    pub fn unsubscribe_all_for_owner(&self, owner: ObjectId) -> usize {
        let mut state = self.inner.state.lock();
        let Some(subscriptions) = state.owners.remove(&owner) else {
            let err = BusError::NoSubscriptions { owner };
            debug!(error = %err, label = err.as_label(), "unsubscribe all ignored");
            return 0;
        };
        let mut removed = 0;
        for (lookup, identity) in &subscriptions {
            if let Some(entry) = state.events.get_mut(lookup) {
                removed += entry.remove(identity);
            }
        }
        debug!(owner = %owner, removed, "unsubscribed owner");
        removed
    }

    // ========== Emit ==========

    /// Emit `payload` to every listener of `key`.
    ///
    /// Returns false when the scope is absent or torn down (the entry is
    /// deleted) or the payload is a collection. Per-listener failures do not
    /// affect the result.
    pub fn emit(
        &self,
        key: &EventKey,
        payload: &Payload,
        pinned: bool,
        scope: Option<&ScopeHandle>,
    ) -> bool {
        self.dispatch(key, payload, pinned, scope, None).is_ok()
    }

    /// Same as [`emit`](Self::emit), returning the number of listeners
    /// invoked or the reason the emit failed.
    pub fn try_emit(
        &self,
        key: &EventKey,
        payload: &Payload,
        pinned: bool,
        scope: Option<&ScopeHandle>,
    ) -> Result<usize, BusError> {
        self.dispatch(key, payload, pinned, scope, None)
    }

    fn dispatch(
        &self,
        key: &EventKey,
        payload: &Payload,
        pinned: bool,
        scope: Option<&ScopeHandle>,
        target: Option<&Listener>,
    ) -> Result<usize, BusError> {
        let lookup = key.as_lookup();

        let scope = match scope {
            Some(scope) if scope.is_valid() => scope,
            other => {
                let err = match other {
                    Some(_) => BusError::InvalidScope { key: lookup.clone() },
                    None => BusError::MissingScope { key: lookup.clone() },
                };
                self.drop_stale_entry(&lookup, &err);
                return Err(err);
            }
        };

        if !payload.is_supported() {
            warn!(key = %lookup, kind = %payload.kind(), "unsupported payload, wrap collections in a record or object");
            return Err(BusError::UnsupportedPayload {
                kind: payload.kind(),
            });
        }

        let registry = Arc::downgrade(&self.inner);
        let snapshot: Vec<Listener> = {
            let mut state = self.inner.state.lock();
            state.entry_or_create(key, &lookup);
            if !state.tag_scope(&lookup, scope, registry) {
                drop(state);
                let err = BusError::InvalidScope { key: lookup.clone() };
                self.drop_stale_entry(&lookup, &err);
                return Err(err);
            }
            let Some(entry) = state.events.get_mut(&lookup) else {
                return Err(BusError::UnknownEvent { key: lookup });
            };
            if pinned {
                entry.pin(payload);
            } else {
                entry.pinned = false;
            }
            match target {
                Some(listener) => vec![listener.clone()],
                None => entry.listeners.clone(),
            }
        };

        let host = self.inner.host.as_ref();
        let mut stale = Vec::new();
        let mut delivered = 0u64;
        let mut skipped = 0u64;
        for listener in &snapshot {
            if !listener.is_owner_alive(host) {
                stale.push(listener.identity());
                continue;
            }
            if let Some(name) = listener.function_name() {
                if !host.has_function(listener.owner(), name) {
                    warn!(key = %lookup, owner = %host.describe(listener.owner()), function = name, "function not found");
                    skipped += 1;
                    continue;
                }
            }
            let Some(callable) = listener.callable() else {
                skipped += 1;
                continue;
            };
            match callable.invoke(payload, &self.options()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        key = %lookup,
                        listener = %listener.identity(),
                        error = %err,
                        label = err.as_label(),
                        "listener skipped"
                    );
                    skipped += 1;
                }
            }
        }

        let stale_removed = self.remove_stale(&lookup, &stale);

        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
        // stats follow the entry; a receiver may have deleted it
        let state = self.inner.state.lock();
        if !state.events.contains_key(&lookup) {
            debug!(key = %lookup, "event deleted during dispatch, stats dropped");
            return Ok(delivered as usize);
        }
        self.increment_stat(&lookup, |s| {
            if target.is_some() {
                s.replayed += 1;
            } else {
                s.emitted += 1;
            }
            s.delivered += delivered;
            s.skipped += skipped;
            s.stale_removed += stale_removed as u64;
            s.last_emit_ns = now;
        });
        drop(state);

        Ok(delivered as usize)
    }

    fn drop_stale_entry(&self, lookup: &str, err: &BusError) {
        let removed = self.inner.state.lock().remove_entry(lookup);
        if removed.is_some() {
            self.inner.stats.remove(lookup);
            if self.options().log_stale_removals {
                info!(key = %lookup, reason = err.as_label(), "auto-removed stale event");
            }
        }
        warn!(key = %lookup, error = %err, "emit failed");
    }

    /// Remove listeners whose owner died during a dispatch, in one batch.
    fn remove_stale(&self, lookup: &str, stale: &[ListenerIdentity]) -> usize {
        if stale.is_empty() {
            return 0;
        }
        let removed = {
            let mut state = self.inner.state.lock();
            let mut removed = 0;
            if let Some(entry) = state.events.get_mut(lookup) {
                for identity in stale {
                    removed += entry.remove(identity);
                }
            }
            for identity in stale {
                state.unindex_owner(identity, lookup);
            }
            removed
        };
        if removed > 0 && self.options().log_stale_removals {
            info!(key = %lookup, removed, "auto-removed stale listeners");
        }
        removed
    }

    fn handle_scope_teardown(&self, scope_id: ScopeId) {
        let removed: Vec<EventEntry> = {
            let mut state = self.inner.state.lock();
            let Some(mut sentinel) = state.scopes.remove(&scope_id) else {
                return;
            };
            let mut removed = Vec::new();
            for lookup in sentinel.drain() {
                if let Some(entry) = state.remove_entry(&lookup) {
                    removed.push(entry);
                }
            }
            removed
        };
        for entry in &removed {
            self.inner.stats.remove(&entry.key().as_lookup());
        }
        if self.options().log_stale_removals {
            info!(scope = %scope_id, removed = removed.len(), "scope torn down, events deleted");
        }
    }

    fn increment_stat<F>(&self, lookup: &str, f: F)
    where
        F: FnOnce(&mut EventStats),
    {
        let mut stats = self.inner.stats.entry(lookup.to_string()).or_default();
        f(stats.value_mut());
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (events, owners, scopes) = {
            let state = self.inner.state.lock();
            (state.events.len(), state.owners.len(), state.scopes.len())
        };
        f.debug_struct("EventRegistry")
            .field("events", &events)
            .field("owners", &owners)
            .field("scopes", &scopes)
            .field("options", &self.options())
            .finish()
    }
}
