//! Host object model interface.
//!
//! The registry never inspects receiver objects itself. It asks an
//! [`ObjectHost`] whether an owner is still alive and which named functions
//! it exposes. [`ObjectTable`] is a self-contained host for applications
//! without their own object system, and for tests.

use std::collections::HashMap;
use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::callable::Callable;

/// Identity of an owner/receiver object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Liveness and reflection queries the registry needs from its host.
pub trait ObjectHost: Send + Sync {
    /// True while `owner` resolves to a live object.
    fn is_alive(&self, owner: ObjectId) -> bool;

    /// Resolve a named function on `owner`.
    fn find_function(&self, owner: ObjectId, name: &str) -> Option<Callable>;

    fn has_function(&self, owner: ObjectId, name: &str) -> bool {
        self.find_function(owner, name).is_some()
    }

    /// Human readable name of `owner` for log lines.
    fn describe(&self, owner: ObjectId) -> String {
        owner.to_string()
    }
}

struct ObjectRecord {
    name: String,
    functions: HashMap<String, Callable>,
}

/// Concurrent table of named objects and their functions.
#[derive(Default)]
pub struct ObjectTable {
    objects: DashMap<ObjectId, ObjectRecord>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live object.
    pub fn spawn(&self, name: impl Into<String>) -> ObjectId {
        let id = ObjectId::new();
        self.objects.insert(
            id,
            ObjectRecord {
                name: name.into(),
                functions: HashMap::new(),
            },
        );
        id
    }

    /// Destroy an object. Its subscriptions become stale.
    pub fn destroy(&self, id: ObjectId) -> bool {
        self.objects.remove(&id).is_some()
    }

    /// Returns false if the object does not exist.
    pub fn add_function(&self, id: ObjectId, name: impl Into<String>, callable: Callable) -> bool {
        match self.objects.get_mut(&id) {
            Some(mut record) => {
                record.functions.insert(name.into(), callable);
                true
            }
            None => false,
        }
    }

    pub fn remove_function(&self, id: ObjectId, name: &str) -> bool {
        self.objects
            .get_mut(&id)
            .map(|mut record| record.functions.remove(name).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectHost for ObjectTable {
    fn is_alive(&self, owner: ObjectId) -> bool {
        self.objects.contains_key(&owner)
    }

    fn find_function(&self, owner: ObjectId, name: &str) -> Option<Callable> {
        self.objects
            .get(&owner)
            .and_then(|record| record.functions.get(name).cloned())
    }

    fn has_function(&self, owner: ObjectId, name: &str) -> bool {
        self.objects
            .get(&owner)
            .map(|record| record.functions.contains_key(name))
            .unwrap_or(false)
    }

    fn describe(&self, owner: ObjectId) -> String {
        match self.objects.get(&owner) {
            Some(record) => format!("{} ({})", record.name, owner),
            None => format!("(invalid object {})", owner),
        }
    }
}
