//! Typed receivers and payload marshaling.
//!
//! A [`Callable`] fixes its parameter type when it is bound. [`Callable::invoke`]
//! is the type-tag switch: it matches the payload's kind against the bound
//! parameter and only calls through when the two agree.

use std::fmt;
use std::sync::Arc;

use crate::error::BusError;
use crate::host::ObjectId;
use crate::options::BusOptions;
use crate::payload::{Name, Payload, Record, RecordType};

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;
type RefHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Receiver closure with its declared parameter type.
#[derive(Clone)]
pub enum Callable {
    /// Takes no parameter.
    Unit(Arc<dyn Fn() + Send + Sync>),
    Str(Arc<dyn Fn(&str) + Send + Sync>),
    Int(Handler<i64>),
    Float(Handler<f64>),
    Bool(Handler<bool>),
    Name(RefHandler<Name>),
    Object(Handler<Option<ObjectId>>),
    /// Declared record type plus handler.
    Record(Arc<RecordType>, RefHandler<Record>),
    /// Accepts any supported payload uninterpreted.
    Wildcard(RefHandler<Payload>),
}

impl Callable {
    pub fn unit(f: impl Fn() + Send + Sync + 'static) -> Self {
        Callable::Unit(Arc::new(f))
    }

    pub fn string(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Callable::Str(Arc::new(f))
    }

    pub fn int(f: impl Fn(i64) + Send + Sync + 'static) -> Self {
        Callable::Int(Arc::new(f))
    }

    pub fn float(f: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Callable::Float(Arc::new(f))
    }

    pub fn boolean(f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        Callable::Bool(Arc::new(f))
    }

    pub fn name(f: impl Fn(&Name) + Send + Sync + 'static) -> Self {
        Callable::Name(Arc::new(f))
    }

    pub fn object(f: impl Fn(Option<ObjectId>) + Send + Sync + 'static) -> Self {
        Callable::Object(Arc::new(f))
    }

    pub fn record(ty: Arc<RecordType>, f: impl Fn(&Record) + Send + Sync + 'static) -> Self {
        Callable::Record(ty, Arc::new(f))
    }

    pub fn wildcard(f: impl Fn(&Payload) + Send + Sync + 'static) -> Self {
        Callable::Wildcard(Arc::new(f))
    }

    /// Label of the declared parameter, used in diagnostics.
    pub fn expects(&self) -> &'static str {
        match self {
            Callable::Unit(_) => "none",
            Callable::Str(_) => "string",
            Callable::Int(_) => "int",
            Callable::Float(_) => "float",
            Callable::Bool(_) => "bool",
            Callable::Name(_) => "name",
            Callable::Object(_) => "object",
            Callable::Record(_, _) => "record",
            Callable::Wildcard(_) => "any",
        }
    }

    /// Address of the closure allocation. Stable for the lifetime of the
    /// callable and shared by its clones.
    pub fn address(&self) -> usize {
        match self {
            Callable::Unit(f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Str(f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Int(f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Float(f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Bool(f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Name(f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Object(f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Record(_, f) => Arc::as_ptr(f) as *const () as usize,
            Callable::Wildcard(f) => Arc::as_ptr(f) as *const () as usize,
        }
    }

    /// Marshal `payload` into the bound parameter type and call through.
    ///
    /// Nothing is invoked on error. Record payloads are checked against the
    /// declared record type only while `validate_record_types` is on.
    pub fn invoke(&self, payload: &Payload, options: &BusOptions) -> Result<(), BusError> {
        if !payload.is_supported() {
            return Err(BusError::UnsupportedPayload {
                kind: payload.kind(),
            });
        }
        match (self, payload) {
            (Callable::Wildcard(f), any) => f(any),
            (Callable::Unit(f), Payload::None) => f(),
            (Callable::Unit(_), other) => {
                return Err(BusError::ParamMismatch {
                    expected: self.expects(),
                    found: other.kind(),
                })
            }
            (_, Payload::None) => {
                return Err(BusError::MissingParam {
                    expected: self.expects(),
                })
            }
            (Callable::Str(f), Payload::Str(value)) => f(value),
            (Callable::Int(f), Payload::Int(value)) => f(*value),
            (Callable::Float(f), Payload::Float(value)) => f(*value),
            (Callable::Bool(f), Payload::Bool(value)) => f(*value),
            (Callable::Name(f), Payload::Name(value)) => f(value),
            (Callable::Object(f), Payload::Object(value)) => f(*value),
            (Callable::Record(expected, f), Payload::Record(record)) => {
                if options.validate_record_types && **expected != **record.record_type() {
                    return Err(BusError::RecordMismatch {
                        expected: expected.name().to_string(),
                        found: record.record_type().name().to_string(),
                    });
                }
                f(record)
            }
            (_, other) => {
                return Err(BusError::ParamMismatch {
                    expected: self.expects(),
                    found: other.kind(),
                })
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Record(ty, _) => write!(f, "Callable(record {})", ty.name()),
            other => write!(f, "Callable({})", other.expects()),
        }
    }
}
