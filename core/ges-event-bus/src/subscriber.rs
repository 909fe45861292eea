//! Subscriber utilities and helpers
//!
//! [`Subscriber`] turns an event key into a channel for async consumers.
//! Payloads are pushed from inside the dispatch loop with a non-blocking
//! unbounded send, so the emitter never waits on the consumer.

use tokio::sync::mpsc;
use tracing::debug;

use crate::callable::Callable;
use crate::host::ObjectId;
use crate::key::EventKey;
use crate::listener::ListenerIdentity;
use crate::payload::Payload;
use crate::registry::EventRegistry;

/// Channel-backed wildcard listener.
///
/// The channel closes once the listener is gone from the registry: after
/// [`detach`](Subscriber::detach), after the owner dies and an emit evicts
/// it, or after the entry is deleted.
pub struct Subscriber {
    registry: EventRegistry,
    key: EventKey,
    owner: ObjectId,
    id: Option<String>,
    receiver: mpsc::UnboundedReceiver<Payload>,
}

impl Subscriber {
    /// Subscribe a channel to `key` on behalf of `owner`.
    ///
    /// `None` if the registry rejects the owner. A pinned entry's snapshot is
    /// already queued when this returns.
    pub fn attach(registry: &EventRegistry, key: EventKey, owner: ObjectId) -> Option<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let lookup = key.as_lookup();
        let callable = Callable::wildcard(move |payload| {
            if sender.send(payload.clone()).is_err() {
                debug!(key = %lookup, "subscriber receiver dropped, payload discarded");
            }
        });
        let id = registry.subscribe_lambda(&key, owner, callable)?;
        Some(Self {
            registry: registry.clone(),
            key,
            owner,
            id: Some(id),
            receiver,
        })
    }

    pub fn key(&self) -> &EventKey {
        &self.key
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Receive next payload. `None` once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }

    /// Try to receive without blocking
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.receiver.try_recv().ok()
    }

    /// Remove the listener. Already queued payloads stay readable.
    ///
    /// Silent when the entry is already gone, e.g. after its scope ended.
    pub fn detach(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };
        let identity = ListenerIdentity::lambda(self.owner, id);
        self.registry
            .remove_listener(&self.key, &identity)
            .is_some_and(|removed| removed > 0)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ObjectTable;
    use crate::scope::World;
    use crate::testing::capture_logs;
    use std::sync::Arc;

    fn setup() -> (Arc<ObjectTable>, EventRegistry, World) {
        let host = Arc::new(ObjectTable::new());
        let registry = EventRegistry::new(host.clone());
        (host, registry, World::new("subscriber-test"))
    }

    #[tokio::test]
    async fn test_subscriber_receives_emits() {
        let (host, registry, world) = setup();
        let key = EventKey::new("net", "packet");
        let owner = host.spawn("consumer");
        let mut subscriber = Subscriber::attach(&registry, key.clone(), owner).unwrap();

        let scope = world.handle();
        registry.emit(&key, &Payload::from(1), false, Some(&scope));
        registry.emit(&key, &Payload::from("two"), false, Some(&scope));

        assert_eq!(subscriber.recv().await, Some(Payload::Int(1)));
        assert_eq!(subscriber.recv().await, Some(Payload::Str("two".into())));
        assert!(subscriber.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_emit_from_another_task() {
        let (host, registry, world) = setup();
        let key = EventKey::new("net", "heartbeat");
        let owner = host.spawn("consumer");
        let mut subscriber = Subscriber::attach(&registry, key.clone(), owner).unwrap();

        let producer = registry.clone();
        let scope = world.handle();
        let emitter_key = key.clone();
        tokio::spawn(async move {
            for beat in 0..3i64 {
                producer.emit(&emitter_key, &Payload::from(beat), false, Some(&scope));
            }
        })
        .await
        .unwrap();

        for beat in 0..3i64 {
            assert_eq!(subscriber.recv().await, Some(Payload::Int(beat)));
        }
    }

    #[test]
    fn test_pinned_snapshot_queued_on_attach() {
        let (host, registry, world) = setup();
        let key = EventKey::new("game", "phase");
        registry.emit(&key, &Payload::from("lobby"), true, Some(&world.handle()));

        let owner = host.spawn("late");
        let mut subscriber = Subscriber::attach(&registry, key, owner).unwrap();
        let first = tokio_test::block_on(subscriber.recv());
        assert_eq!(first, Some(Payload::Str("lobby".into())));
    }

    #[test]
    fn test_detach_closes_channel() {
        let (host, registry, world) = setup();
        let key = EventKey::new("game", "phase");
        let owner = host.spawn("consumer");
        let mut subscriber = Subscriber::attach(&registry, key.clone(), owner).unwrap();
        registry.emit(&key, &Payload::from(true), false, Some(&world.handle()));

        assert!(subscriber.detach());
        assert!(!subscriber.detach());
        assert_eq!(registry.listener_count(&key), 0);
        assert_eq!(tokio_test::block_on(subscriber.recv()), Some(Payload::Bool(true)));
        assert_eq!(tokio_test::block_on(subscriber.recv()), None);
    }

    #[test]
    fn test_attach_rejects_dead_owner() {
        let (host, registry, _world) = setup();
        let owner = host.spawn("gone");
        host.destroy(owner);
        assert!(Subscriber::attach(&registry, EventKey::new("a", "b"), owner).is_none());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (host, registry, _world) = setup();
        let key = EventKey::new("ui", "click");
        let owner = host.spawn("button");
        let subscriber = Subscriber::attach(&registry, key.clone(), owner).unwrap();
        assert_eq!(registry.listener_count(&key), 1);
        drop(subscriber);
        assert_eq!(registry.listener_count(&key), 0);
    }

    #[test]
    fn test_drop_after_scope_teardown_is_silent() {
        let (host, registry, world) = setup();
        let key = EventKey::new("session", "state");
        let owner = host.spawn("consumer");
        let subscriber = Subscriber::attach(&registry, key.clone(), owner).unwrap();
        registry.emit(&key, &Payload::from("running"), true, Some(&world.handle()));

        world.end_play();
        assert!(!registry.has_event(&key));

        let logs = capture_logs(|| drop(subscriber));
        assert!(!logs.contains("doesn't exist"), "{logs}");
        assert!(!logs.contains("WARN"), "{logs}");
    }
}
