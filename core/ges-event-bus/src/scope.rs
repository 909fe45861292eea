//! Lifetime scopes.
//!
//! A scope is an external lifetime boundary (a world, a session). The
//! registry needs two things from it: a validity check, and a way to be told
//! when it is torn down. [`World`] is a ready-made scope for hosts that do
//! not bring their own.
//!
//! ## Teardown
//! ```text
//! World::end_play() ──► mark invalid ──► run hooks (once) ──► ScopeSentinel
//!                                                              └─► delete tagged entries
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Called once when a scope is torn down.
pub type TeardownHook = Box<dyn FnOnce(ScopeId) + Send>;

/// External lifetime authority.
pub trait Scope: Send + Sync {
    fn scope_id(&self) -> ScopeId;

    /// False once the scope has been torn down.
    fn is_valid(&self) -> bool;

    /// Register `hook` to run at teardown. Returns false, dropping the hook,
    /// if the scope is already gone.
    fn on_teardown(&self, hook: TeardownHook) -> bool;

    fn describe(&self) -> String {
        format!("scope {}", self.scope_id())
    }
}

pub type ScopeHandle = Arc<dyn Scope>;

struct WorldCore {
    id: ScopeId,
    name: String,
    ended: AtomicBool,
    hooks: Mutex<Vec<TeardownHook>>,
}

impl Scope for WorldCore {
    fn scope_id(&self) -> ScopeId {
        self.id
    }

    fn is_valid(&self) -> bool {
        !self.ended.load(Ordering::Acquire)
    }

    fn on_teardown(&self, hook: TeardownHook) -> bool {
        let mut hooks = self.hooks.lock();
        if self.ended.load(Ordering::Acquire) {
            return false;
        }
        hooks.push(hook);
        true
    }

    fn describe(&self) -> String {
        format!("world {} ({})", self.name, self.id)
    }
}

/// A world scope. Ends on [`World::end_play`] or when dropped.
pub struct World {
    core: Arc<WorldCore>,
}

impl World {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: Arc::new(WorldCore {
                id: ScopeId::new(),
                name: name.into(),
                ended: AtomicBool::new(false),
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Handle to pass to emits and subscribes.
    pub fn handle(&self) -> ScopeHandle {
        self.core.clone()
    }

    pub fn is_valid(&self) -> bool {
        self.core.is_valid()
    }

    /// Teardown hooks registered and not yet run.
    pub fn hook_count(&self) -> usize {
        self.core.hooks.lock().len()
    }

    /// Tear the world down. Idempotent.
    pub fn end_play(&self) {
        let hooks = {
            let mut hooks = self.core.hooks.lock();
            if self.core.ended.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *hooks)
        };
        debug!(world = %self.core.name, hooks = hooks.len(), "world ending");
        for hook in hooks {
            hook(self.core.id);
        }
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.end_play();
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("valid", &self.is_valid())
            .finish()
    }
}
