//! Error types for the event registry.
//!
//! The public registry surface never propagates these to callers of
//! `emit`/`subscribe`; they are logged and folded into a `bool`. They are
//! exposed through [`EventRegistry::try_emit`](crate::EventRegistry::try_emit)
//! and the lower-level building blocks.

use thiserror::Error;

use crate::host::ObjectId;
use crate::payload::PayloadKind;

/// Failures raised while binding, marshaling or dispatching events.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    /// Lookup or removal against a key with no entry.
    #[error("event {key} does not exist")]
    UnknownEvent { key: String },

    /// The owning object no longer resolves to a live object.
    #[error("owner {owner} is not a live object")]
    DeadOwner { owner: ObjectId },

    /// The owner is alive but does not expose the named function.
    #[error("{owner} does not have the function '{function}'")]
    MissingFunction { owner: String, function: String },

    /// Emit carried a scope handle that has been torn down.
    #[error("scope for event {key} is no longer valid")]
    InvalidScope { key: String },

    /// Emit carried no scope handle at all.
    #[error("emit of {key} requires a scope")]
    MissingScope { key: String },

    /// Payload kind does not match what the receiver was bound with.
    #[error("receiver expects {expected}, got {found}")]
    ParamMismatch {
        expected: &'static str,
        found: PayloadKind,
    },

    /// Empty emit delivered to a receiver that requires a parameter.
    #[error("receiver expects {expected}, event carried no payload")]
    MissingParam { expected: &'static str },

    /// Strict record validation rejected the emitted record type.
    #[error("receiver expects record {expected}, got record {found}")]
    RecordMismatch { expected: String, found: String },

    /// Collection payloads cannot be marshaled to receivers.
    #[error("unsupported payload kind {kind}; wrap collections in a record or object")]
    UnsupportedPayload { kind: PayloadKind },

    /// Record bytes do not cover the record type layout.
    #[error("record {record} needs {expected} bytes, got {found}")]
    RecordSize {
        record: String,
        expected: usize,
        found: usize,
    },

    /// Owner has no tracked subscriptions.
    #[error("owner {owner} has no subscriptions")]
    NoSubscriptions { owner: ObjectId },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use ges_event_bus::BusError;
    ///
    /// let err = BusError::UnknownEvent { key: "game.score".into() };
    /// assert_eq!(err.as_label(), "unknown_event");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::UnknownEvent { .. } => "unknown_event",
            BusError::DeadOwner { .. } => "dead_owner",
            BusError::MissingFunction { .. } => "missing_function",
            BusError::InvalidScope { .. } => "invalid_scope",
            BusError::MissingScope { .. } => "missing_scope",
            BusError::ParamMismatch { .. } => "param_mismatch",
            BusError::MissingParam { .. } => "missing_param",
            BusError::RecordMismatch { .. } => "record_mismatch",
            BusError::UnsupportedPayload { .. } => "unsupported_payload",
            BusError::RecordSize { .. } => "record_size",
            BusError::NoSubscriptions { .. } => "no_subscriptions",
        }
    }

    /// True for the scope failures that make a subscribe retry worthwhile.
    pub fn is_scope_failure(&self) -> bool {
        matches!(
            self,
            BusError::InvalidScope { .. } | BusError::MissingScope { .. }
        )
    }
}
