//! # GES Event Bus
//!
//! String-keyed publish/subscribe registry for hosts running many
//! interacting objects with overlapping lifetimes.
//!
//! ## Features
//!
//! - **Two-part keys**: events are addressed by `domain` + `event` strings, created on first use
//! - **Pinning**: the last pinned payload is replayed to late subscribers
//! - **Scoped teardown**: entries die with the world they were emitted in
//! - **Binding strategies**: named functions, lambdas and delegates
//! - **Stale eviction**: listeners whose owner died are dropped after the next emit
//! - **Reentrant**: receivers may emit and subscribe from inside a dispatch
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ges_event_bus::{Callable, EventKey, EventRegistry, Listener, ObjectTable, Payload, World};
//!
//! let host = Arc::new(ObjectTable::new());
//! let registry = EventRegistry::new(host.clone());
//! let world = World::new("level-1");
//!
//! let hud = host.spawn("hud");
//! host.add_function(hud, "OnScore", Callable::int(|score| println!("score {score}")));
//!
//! let key = EventKey::new("game", "score_changed");
//! registry.subscribe(&key, Listener::function(hud, "OnScore"));
//! assert!(registry.emit(&key, &Payload::from(42), true, Some(&world.handle())));
//!
//! // late subscribers get the pinned value straight away
//! let log = host.spawn("log");
//! registry.subscribe_lambda(&key, log, Callable::wildcard(|p| println!("replayed {}", p.to_json())));
//!
//! world.end_play();
//! assert!(!registry.has_event(&key));
//! ```

pub mod error;
pub mod options;

// Data model
pub mod key;
pub mod payload;
pub mod pinned;

// Bindings
pub mod host;
pub mod callable;
pub mod listener;

// Registry
pub mod entry;
pub mod scope;
pub mod sentinel;
pub mod registry;

// Surfaces
pub mod publisher;
pub mod subscriber;

#[cfg(test)]
mod testing;

// Re-exports
pub use error::BusError;
pub use options::BusOptions;
pub use key::{EventKey, DEFAULT_DOMAIN};
pub use payload::{Field, FieldKind, Name, Payload, PayloadKind, Record, RecordType, TypeDescriptor};
pub use pinned::PinnedData;
pub use host::{ObjectHost, ObjectId, ObjectTable};
pub use callable::Callable;
pub use listener::{Binding, BindingId, BindingKind, Delegate, Listener, ListenerIdentity};
pub use entry::EventEntry;
pub use scope::{Scope, ScopeHandle, ScopeId, TeardownHook, World};
pub use sentinel::ScopeSentinel;
pub use registry::{EventRegistry, EventStats};
pub use publisher::Publisher;
pub use subscriber::Subscriber;
