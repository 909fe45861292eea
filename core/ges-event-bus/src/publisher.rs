//! Publisher utilities and helpers

use crate::host::ObjectId;
use crate::key::EventKey;
use crate::payload::{Name, Payload, Record};
use crate::registry::EventRegistry;
use crate::scope::ScopeHandle;

/// Emits on behalf of one scope, with one method per payload type.
#[derive(Clone)]
pub struct Publisher {
    registry: EventRegistry,
    scope: ScopeHandle,
}

impl Publisher {
    pub fn new(registry: EventRegistry, scope: ScopeHandle) -> Self {
        Self { registry, scope }
    }

    pub fn scope(&self) -> &ScopeHandle {
        &self.scope
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Emit any payload under this publisher's scope.
    pub fn emit(&self, key: &EventKey, payload: impl Into<Payload>, pinned: bool) -> bool {
        self.registry
            .emit(key, &payload.into(), pinned, Some(&self.scope))
    }

    pub fn emit_none(&self, key: &EventKey, pinned: bool) -> bool {
        self.registry.emit(key, &Payload::None, pinned, Some(&self.scope))
    }

    pub fn emit_str(&self, key: &EventKey, value: &str, pinned: bool) -> bool {
        self.emit(key, value, pinned)
    }

    pub fn emit_int(&self, key: &EventKey, value: i64, pinned: bool) -> bool {
        self.emit(key, value, pinned)
    }

    pub fn emit_float(&self, key: &EventKey, value: f64, pinned: bool) -> bool {
        self.emit(key, value, pinned)
    }

    pub fn emit_bool(&self, key: &EventKey, value: bool, pinned: bool) -> bool {
        self.emit(key, value, pinned)
    }

    pub fn emit_name(&self, key: &EventKey, value: Name, pinned: bool) -> bool {
        self.emit(key, value, pinned)
    }

    /// `None` emits a null object reference.
    pub fn emit_object(&self, key: &EventKey, value: Option<ObjectId>, pinned: bool) -> bool {
        self.emit(key, Payload::Object(value), pinned)
    }

    pub fn emit_record(&self, key: &EventKey, value: Record, pinned: bool) -> bool {
        self.emit(key, value, pinned)
    }
}
