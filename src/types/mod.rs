use byteordered::Endianness;
use internment::Intern;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

pub use event::Event;

pub mod event;

/// Numeric id of a stream class, assigned by the metadata.
pub type StreamId = u64;

/// Numeric id of an event class, scoped to its stream class.
pub type EventId = u64;

/// A trace clock value, reconstructed to full 64-bit width.
pub type Timestamp = u64;

/// A free-running, per-stream discarded-event counter snapshot.
pub type EventCount = u64;

/// Magic number found in the trace-packet-header's `magic` field (spec.md §6).
pub const CTF_MAGIC_NUMBER: u32 = 0xC1FC_1FC1;

/// Magic number identifying packet-framed binary metadata (spec.md §4.D).
pub const TSDL_MAGIC: u32 = 0x75D1_1D57;

/// Trace-wide byte order, fixed for the lifetime of the trace (spec.md §3 invariant 5).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn host() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }
}

impl From<ByteOrder> for Endianness {
    fn from(value: ByteOrder) -> Self {
        match value {
            ByteOrder::Little => Endianness::Little,
            ByteOrder::Big => Endianness::Big,
        }
    }
}

/// The preferred base (radix) to use when displaying an integer field's instances.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum PreferredDisplayBase {
    Binary,
    Octal,
    #[default]
    Decimal,
    Hexadecimal,
}

/// A single decoded primitive value.
#[derive(Clone, PartialEq, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum PrimitiveFieldValue {
    UnsignedInteger(u64, PreferredDisplayBase),
    SignedInteger(i64, PreferredDisplayBase),
    String(String),
    F32(OrderedFloat<f32>),
    F64(OrderedFloat<f64>),
    Enumeration(i64, PreferredDisplayBase, Option<Intern<String>>),
}

/// A decoded field value: either a single primitive, or a fixed/dynamic array of them.
#[derive(Clone, PartialEq, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum FieldValue {
    Primitive(PrimitiveFieldValue),
    Array(Vec<PrimitiveFieldValue>),
}

impl From<PrimitiveFieldValue> for FieldValue {
    fn from(v: PrimitiveFieldValue) -> Self {
        Self::Primitive(v)
    }
}

impl From<Vec<PrimitiveFieldValue>> for FieldValue {
    fn from(v: Vec<PrimitiveFieldValue>) -> Self {
        Self::Array(v)
    }
}

impl FieldValue {
    /// Interprets this value as an unsigned integer, following the enum/signed
    /// conversions that spec.md §4.B's `get_unsigned_int` lookup implies.
    pub fn as_unsigned_int(&self) -> Option<u64> {
        match self {
            FieldValue::Primitive(PrimitiveFieldValue::UnsignedInteger(v, _)) => Some(*v),
            FieldValue::Primitive(PrimitiveFieldValue::SignedInteger(v, _)) => Some(*v as u64),
            FieldValue::Primitive(PrimitiveFieldValue::Enumeration(v, _, _)) => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_signed_int(&self) -> Option<i64> {
        match self {
            FieldValue::Primitive(PrimitiveFieldValue::UnsignedInteger(v, _)) => Some(*v as i64),
            FieldValue::Primitive(PrimitiveFieldValue::SignedInteger(v, _)) => Some(*v),
            FieldValue::Primitive(PrimitiveFieldValue::Enumeration(v, _, _)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum_label(&self) -> Option<Intern<String>> {
        match self {
            FieldValue::Primitive(PrimitiveFieldValue::Enumeration(_, _, label)) => *label,
            _ => None,
        }
    }

    pub fn array_len(&self) -> Option<usize> {
        match self {
            FieldValue::Array(v) => Some(v.len()),
            _ => None,
        }
    }

    pub fn array_index(&self, i: usize) -> Option<&PrimitiveFieldValue> {
        match self {
            FieldValue::Array(v) => v.get(i),
            _ => None,
        }
    }
}

impl From<u8> for PrimitiveFieldValue {
    fn from(v: u8) -> Self {
        PrimitiveFieldValue::UnsignedInteger(v.into(), PreferredDisplayBase::default())
    }
}

impl From<u16> for PrimitiveFieldValue {
    fn from(v: u16) -> Self {
        PrimitiveFieldValue::UnsignedInteger(v.into(), PreferredDisplayBase::default())
    }
}

impl From<u32> for PrimitiveFieldValue {
    fn from(v: u32) -> Self {
        PrimitiveFieldValue::UnsignedInteger(v.into(), PreferredDisplayBase::default())
    }
}

impl From<u64> for PrimitiveFieldValue {
    fn from(v: u64) -> Self {
        PrimitiveFieldValue::UnsignedInteger(v, PreferredDisplayBase::default())
    }
}

impl From<i8> for PrimitiveFieldValue {
    fn from(v: i8) -> Self {
        PrimitiveFieldValue::SignedInteger(v.into(), PreferredDisplayBase::default())
    }
}

impl From<i16> for PrimitiveFieldValue {
    fn from(v: i16) -> Self {
        PrimitiveFieldValue::SignedInteger(v.into(), PreferredDisplayBase::default())
    }
}

impl From<i32> for PrimitiveFieldValue {
    fn from(v: i32) -> Self {
        PrimitiveFieldValue::SignedInteger(v.into(), PreferredDisplayBase::default())
    }
}

impl From<i64> for PrimitiveFieldValue {
    fn from(v: i64) -> Self {
        PrimitiveFieldValue::SignedInteger(v, PreferredDisplayBase::default())
    }
}

impl From<String> for PrimitiveFieldValue {
    fn from(v: String) -> Self {
        PrimitiveFieldValue::String(v)
    }
}

impl From<&str> for PrimitiveFieldValue {
    fn from(v: &str) -> Self {
        PrimitiveFieldValue::String(v.to_owned())
    }
}

impl From<f32> for PrimitiveFieldValue {
    fn from(v: f32) -> Self {
        PrimitiveFieldValue::F32(OrderedFloat(v))
    }
}

impl From<f64> for PrimitiveFieldValue {
    fn from(v: f64) -> Self {
        PrimitiveFieldValue::F64(OrderedFloat(v))
    }
}
