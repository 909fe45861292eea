//! Listener bindings.
//!
//! A [`Listener`] is one subscription: the owning object plus how to reach
//! it. Two listeners are the same subscription when their
//! [`ListenerIdentity`] matches, i.e. same owner and same function name,
//! lambda identity or delegate name.

use std::fmt;

use crate::callable::Callable;
use crate::error::BusError;
use crate::host::{ObjectHost, ObjectId};

/// Binding strategy tag, for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Function,
    Lambda,
    Delegate,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Function => f.write_str("function"),
            BindingKind::Lambda => f.write_str("lambda"),
            BindingKind::Delegate => f.write_str("delegate"),
        }
    }
}

/// Owner-bound wildcard handler identified by name.
#[derive(Clone)]
pub struct Delegate {
    name: String,
    callable: Callable,
}

impl Delegate {
    pub fn new(name: impl Into<String>, f: impl Fn(&crate::Payload) + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            callable: Callable::wildcard(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }
}

#[derive(Clone)]
pub enum Binding {
    /// Function looked up by name on the owner. `resolved` caches the
    /// callable found at link time.
    Function {
        name: String,
        resolved: Option<Callable>,
    },
    /// Closure captured at subscribe time.
    Lambda { id: String, callable: Callable },
    Delegate(Delegate),
}

/// Field that identifies a binding within its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingId {
    Function(String),
    Lambda(String),
    Delegate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerIdentity {
    pub owner: ObjectId,
    pub binding: BindingId,
}

impl ListenerIdentity {
    pub fn function(owner: ObjectId, name: impl Into<String>) -> Self {
        Self {
            owner,
            binding: BindingId::Function(name.into()),
        }
    }

    pub fn lambda(owner: ObjectId, id: impl Into<String>) -> Self {
        Self {
            owner,
            binding: BindingId::Lambda(id.into()),
        }
    }

    pub fn delegate(owner: ObjectId, name: impl Into<String>) -> Self {
        Self {
            owner,
            binding: BindingId::Delegate(name.into()),
        }
    }
}

impl fmt::Display for ListenerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            BindingId::Function(name) => write!(f, "{}::{}", self.owner, name),
            BindingId::Lambda(id) => f.write_str(id),
            BindingId::Delegate(name) => write!(f, "{}::delegate({})", self.owner, name),
        }
    }
}

/// Stable identity string of a lambda bound by `owner`.
pub fn lambda_identity(owner: ObjectId, callable: &Callable) -> String {
    format!("{}.lambda.{:x}", owner, callable.address())
}

/// One subscription.
#[derive(Clone)]
pub struct Listener {
    owner: ObjectId,
    binding: Binding,
}

impl Listener {
    /// Bind to the function `name` on `owner`. Resolved at subscribe time.
    pub fn function(owner: ObjectId, name: impl Into<String>) -> Self {
        Self {
            owner,
            binding: Binding::Function {
                name: name.into(),
                resolved: None,
            },
        }
    }

    pub fn lambda(owner: ObjectId, callable: Callable) -> Self {
        let id = lambda_identity(owner, &callable);
        Self {
            owner,
            binding: Binding::Lambda { id, callable },
        }
    }

    pub fn delegate(owner: ObjectId, delegate: Delegate) -> Self {
        Self {
            owner,
            binding: Binding::Delegate(delegate),
        }
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn kind(&self) -> BindingKind {
        match self.binding {
            Binding::Function { .. } => BindingKind::Function,
            Binding::Lambda { .. } => BindingKind::Lambda,
            Binding::Delegate(_) => BindingKind::Delegate,
        }
    }

    pub fn identity(&self) -> ListenerIdentity {
        let binding = match &self.binding {
            Binding::Function { name, .. } => BindingId::Function(name.clone()),
            Binding::Lambda { id, .. } => BindingId::Lambda(id.clone()),
            Binding::Delegate(delegate) => BindingId::Delegate(delegate.name.clone()),
        };
        ListenerIdentity {
            owner: self.owner,
            binding,
        }
    }

    /// Function name for named bindings.
    pub fn function_name(&self) -> Option<&str> {
        match &self.binding {
            Binding::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Callable to invoke. `None` for a function binding not linked yet.
    pub fn callable(&self) -> Option<&Callable> {
        match &self.binding {
            Binding::Function { resolved, .. } => resolved.as_ref(),
            Binding::Lambda { callable, .. } => Some(callable),
            Binding::Delegate(delegate) => Some(&delegate.callable),
        }
    }

    /// Check the owner is alive and, for named bindings, resolve and cache
    /// the function.
    pub fn link(&mut self, host: &dyn ObjectHost) -> Result<(), BusError> {
        if !host.is_alive(self.owner) {
            return Err(BusError::DeadOwner { owner: self.owner });
        }
        if let Binding::Function { name, resolved } = &mut self.binding {
            match host.find_function(self.owner, name) {
                Some(callable) => *resolved = Some(callable),
                None => {
                    return Err(BusError::MissingFunction {
                        owner: host.describe(self.owner),
                        function: name.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Owner liveness only; stale listeners fail this.
    pub fn is_owner_alive(&self, host: &dyn ObjectHost) -> bool {
        host.is_alive(self.owner)
    }

    /// Full validity: live owner and, for named bindings, the function still
    /// resolves on it.
    pub fn is_valid(&self, host: &dyn ObjectHost) -> bool {
        if !self.is_owner_alive(host) {
            return false;
        }
        match &self.binding {
            Binding::Function { name, .. } => host.has_function(self.owner, name),
            Binding::Lambda { .. } | Binding::Delegate(_) => true,
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("owner", &self.owner)
            .field("kind", &self.kind())
            .field("identity", &self.identity().to_string())
            .finish()
    }
}
