//! Event payloads
//!
//! A [`Payload`] is the single value carried by an emit. Receivers bind with
//! a fixed parameter type while the payload's kind is only known at emit
//! time, so every payload reports a [`PayloadKind`] tag the dispatch engine
//! branches on before invoking anything.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::BusError;
use crate::host::ObjectId;

// ============================================================================
// Kind tags
// ============================================================================

/// Type tag of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadKind {
    None,
    Str,
    Int,
    Float,
    Bool,
    Name,
    Object,
    Record,
    Array,
    Map,
    Set,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::None => "none",
            PayloadKind::Str => "string",
            PayloadKind::Int => "int",
            PayloadKind::Float => "float",
            PayloadKind::Bool => "bool",
            PayloadKind::Name => "name",
            PayloadKind::Object => "object",
            PayloadKind::Record => "record",
            PayloadKind::Array => "array",
            PayloadKind::Map => "map",
            PayloadKind::Set => "set",
        }
    }

    /// Collection kinds cannot be dispatched.
    pub fn is_collection(&self) -> bool {
        matches!(self, PayloadKind::Array | PayloadKind::Map | PayloadKind::Set)
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Names
// ============================================================================

/// Symbol-like identifier, distinct from free-form strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Primitive field kinds a record layout is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldKind {
    Bool,
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl FieldKind {
    pub fn size(&self) -> usize {
        match self {
            FieldKind::Bool | FieldKind::U8 => 1,
            FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::I64 | FieldKind::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// Layout descriptor for a struct-like payload. Fields are packed in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RecordType {
    name: String,
    fields: Vec<Field>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Byte size of a value of this type.
    pub fn size(&self) -> usize {
        self.fields.iter().map(|field| field.kind.size()).sum()
    }

    /// Same field kinds in the same order, names ignored.
    pub fn is_layout_compatible(&self, other: &RecordType) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.kind == b.kind)
    }

    fn offset_of(&self, index: usize, kind: FieldKind) -> Option<usize> {
        let field = self.fields.get(index)?;
        if field.kind != kind {
            return None;
        }
        Some(self.fields[..index].iter().map(|f| f.kind.size()).sum())
    }
}

/// Opaque struct-like value: a type descriptor plus its packed bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    ty: Arc<RecordType>,
    bytes: Box<[u8]>,
}

impl Record {
    /// Wrap existing bytes. The buffer must match the type size exactly.
    pub fn new(ty: Arc<RecordType>, bytes: impl Into<Box<[u8]>>) -> Result<Self, BusError> {
        let bytes = bytes.into();
        if bytes.len() != ty.size() {
            return Err(BusError::RecordSize {
                record: ty.name().to_string(),
                expected: ty.size(),
                found: bytes.len(),
            });
        }
        Ok(Self { ty, bytes })
    }

    pub fn zeroed(ty: Arc<RecordType>) -> Self {
        let bytes = vec![0u8; ty.size()].into_boxed_slice();
        Self { ty, bytes }
    }

    /// Record whose fields are all `f32`, filled from `values` in order.
    pub fn from_f32s(ty: Arc<RecordType>, values: &[f32]) -> Result<Self, BusError> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(ty, bytes)
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn read_f32(&self, index: usize) -> Option<f32> {
        let offset = self.ty.offset_of(index, FieldKind::F32)?;
        let raw: [u8; 4] = self.bytes.get(offset..offset + 4)?.try_into().ok()?;
        Some(f32::from_le_bytes(raw))
    }

    pub fn read_i32(&self, index: usize) -> Option<i32> {
        let offset = self.ty.offset_of(index, FieldKind::I32)?;
        let raw: [u8; 4] = self.bytes.get(offset..offset + 4)?.try_into().ok()?;
        Some(i32::from_le_bytes(raw))
    }

    /// Returns false when the field is absent or not an `f32`.
    pub fn write_f32(&mut self, index: usize, value: f32) -> bool {
        match self.ty.offset_of(index, FieldKind::F32) {
            Some(offset) => {
                self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }

    pub fn write_i32(&mut self, index: usize, value: i32) -> bool {
        match self.ty.offset_of(index, FieldKind::I32) {
            Some(offset) => {
                self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Record", 2)?;
        state.serialize_field("type", self.ty.name())?;
        state.serialize_field("bytes", &self.bytes[..])?;
        state.end()
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Value carried by one emit.
///
/// Emits borrow a payload for the duration of the call; the registry takes
/// its own deep copy only when the emit is pinned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Payload {
    None,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Name(Name),
    Object(Option<ObjectId>),
    Record(Record),
    Array(Vec<Payload>),
    Map(Vec<(Payload, Payload)>),
    Set(Vec<Payload>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::None => PayloadKind::None,
            Payload::Str(_) => PayloadKind::Str,
            Payload::Int(_) => PayloadKind::Int,
            Payload::Float(_) => PayloadKind::Float,
            Payload::Bool(_) => PayloadKind::Bool,
            Payload::Name(_) => PayloadKind::Name,
            Payload::Object(_) => PayloadKind::Object,
            Payload::Record(_) => PayloadKind::Record,
            Payload::Array(_) => PayloadKind::Array,
            Payload::Map(_) => PayloadKind::Map,
            Payload::Set(_) => PayloadKind::Set,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }

    /// False for the collection shapes, which dispatch cannot marshal.
    pub fn is_supported(&self) -> bool {
        !self.kind().is_collection()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Payload::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Payload::Name(value) => Some(value),
            _ => None,
        }
    }

    /// `Some(None)` for a null object reference.
    pub fn as_object(&self) -> Option<Option<ObjectId>> {
        match self {
            Payload::Object(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Payload::Record(value) => Some(value),
            _ => None,
        }
    }

    /// JSON rendering for diagnostics.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("<{}>", self.kind()))
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Str(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Str(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Int(value)
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Payload::Int(value.into())
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Float(value)
    }
}

impl From<f32> for Payload {
    fn from(value: f32) -> Self {
        Payload::Float(value.into())
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<Name> for Payload {
    fn from(value: Name) -> Self {
        Payload::Name(value)
    }
}

impl From<ObjectId> for Payload {
    fn from(value: ObjectId) -> Self {
        Payload::Object(Some(value))
    }
}

impl From<Record> for Payload {
    fn from(value: Record) -> Self {
        Payload::Record(value)
    }
}

// ============================================================================
// Type descriptors
// ============================================================================

/// Shape descriptor kept alongside a pinned snapshot.
///
/// Primitive descriptors are synthesized per snapshot; record descriptors
/// share the record type with every other value of that type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(PayloadKind),
    Record(Arc<RecordType>),
}

impl TypeDescriptor {
    pub fn of(payload: &Payload) -> Self {
        match payload {
            Payload::Record(record) => TypeDescriptor::Record(Arc::clone(record.record_type())),
            other => TypeDescriptor::Primitive(other.kind()),
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            TypeDescriptor::Primitive(kind) => *kind,
            TypeDescriptor::Record(_) => PayloadKind::Record,
        }
    }

    /// True when the descriptor was created for a single snapshot.
    pub fn is_synthesized(&self) -> bool {
        matches!(self, TypeDescriptor::Primitive(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector3() -> Arc<RecordType> {
        RecordType::new("Vector3")
            .with_field("x", FieldKind::F32)
            .with_field("y", FieldKind::F32)
            .with_field("z", FieldKind::F32)
            .shared()
    }

    #[test]
    fn test_record_size_from_layout() {
        let ty = RecordType::new("Mixed")
            .with_field("flag", FieldKind::Bool)
            .with_field("count", FieldKind::I32)
            .with_field("total", FieldKind::F64);
        assert_eq!(ty.size(), 13);
    }

    #[test]
    fn test_record_rejects_short_buffer() {
        let err = Record::new(vector3(), vec![0u8; 8]).unwrap_err();
        assert_eq!(
            err,
            BusError::RecordSize {
                record: "Vector3".into(),
                expected: 12,
                found: 8
            }
        );
    }

    #[test]
    fn test_record_field_access() {
        let mut record = Record::from_f32s(vector3(), &[1.0, 2.5, -3.0]).unwrap();
        assert_eq!(record.read_f32(1), Some(2.5));
        assert_eq!(record.read_i32(1), None);
        assert_eq!(record.read_f32(3), None);

        assert!(record.write_f32(2, 9.0));
        assert_eq!(record.read_f32(2), Some(9.0));
        assert!(!record.write_i32(0, 1));
    }

    #[test]
    fn test_layout_compatibility_ignores_names() {
        let color = RecordType::new("Color")
            .with_field("r", FieldKind::F32)
            .with_field("g", FieldKind::F32)
            .with_field("b", FieldKind::F32);
        assert!(color.is_layout_compatible(&vector3()));
        assert_ne!(&color, vector3().as_ref());
    }

    #[test]
    fn test_kinds_and_support() {
        assert_eq!(Payload::from(42).kind(), PayloadKind::Int);
        assert_eq!(Payload::from(0.5f32).kind(), PayloadKind::Float);
        assert!(Payload::None.is_supported());
        assert!(!Payload::Array(vec![Payload::from(1)]).is_supported());
        assert!(!Payload::Map(Vec::new()).is_supported());
        assert!(!Payload::Set(Vec::new()).is_supported());
    }

    #[test]
    fn test_wildcard_accessors() {
        let payload = Payload::from("hello");
        assert_eq!(payload.as_str(), Some("hello"));
        assert_eq!(payload.as_int(), None);
        assert_eq!(Payload::from(true).as_bool(), Some(true));
        assert_eq!(Payload::Object(None).as_object(), Some(None));
        assert_eq!(Payload::from(Name::new("Jump")).as_name().map(Name::as_str), Some("Jump"));
    }

    #[test]
    fn test_json_rendering() {
        let record = Record::from_f32s(vector3(), &[0.0, 0.0, 0.0]).unwrap();
        let json = Payload::from(record).to_json();
        assert!(json.contains("\"Vector3\""));
        assert_eq!(Payload::from(7).to_json(), r#"{"Int":7}"#);
    }

    #[test]
    fn test_descriptor_sharing() {
        let ty = vector3();
        let record = Record::zeroed(Arc::clone(&ty));
        match TypeDescriptor::of(&Payload::from(record)) {
            TypeDescriptor::Record(shared) => assert!(Arc::ptr_eq(&shared, &ty)),
            other => panic!("expected record descriptor, got {:?}", other),
        }
        assert!(TypeDescriptor::of(&Payload::from(1)).is_synthesized());
    }
}
