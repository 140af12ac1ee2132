//! The declaration model consumed by the core (spec.md §4.B).
//!
//! A [`Declaration`] is a type description: one of the eight type classes
//! spec.md §3 names. It carries everything [`crate::dispatch`] needs to
//! decode an instance of it from a [`crate::bitpos::Cursor`], and everything
//! [`crate::index`]/[`crate::event`] need to resolve field names inside it.
//!
//! This tree is exactly the "declarations in" side of the contract spec.md
//! §1 describes as consumed from an external metadata parser; see
//! `SPEC_FULL.md §1.1` for the one concrete producer this crate ships
//! ([`crate::metadata::text::TextMetadataParser`]).

use crate::types::{ByteOrder, PreferredDisplayBase};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// A reference to a field whose already-decoded value this declaration needs
/// in order to be decoded itself (a variant's tag, or a sequence's length).
///
/// Resolved per the scoping decision recorded in `DESIGN.md` #4: a single
/// name resolves against already-decoded siblings in the enclosing struct; a
/// dotted name's first segment names one of the six root scopes
/// (`trace.packet.header`, `stream.packet.context`, `stream.event.header`,
/// `stream.event.context`, `event.context`, `event.fields`).
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FieldRef(pub String);

impl FieldRef {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    /// Splits a dotted reference into (root scope name, remaining path), or
    /// `None` if this is a bare sibling reference with no dots.
    pub fn root_and_rest(&self) -> Option<(&str, &str)> {
        let dot = self.0.find('.')?;
        // Only split when the prefix names one of the known roots; otherwise
        // treat the whole thing as a single (possibly dotted-looking) sibling name.
        let prefix = &self.0[..dot];
        if crate::scope::ROOT_SCOPE_NAMES.contains(&prefix) {
            Some((prefix, &self.0[dot + 1..]))
        } else {
            None
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct IntegerDecl {
    /// Size of this field type's instances (bits). 1..=64.
    pub size: usize,
    pub signed: bool,
    /// `None` means "use the trace's byte order".
    pub byte_order: Option<ByteOrder>,
    pub base: PreferredDisplayBase,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FloatDecl {
    /// 32 or 64.
    pub size: usize,
    pub byte_order: Option<ByteOrder>,
}

/// One value or inclusive range mapped to an enumeration label.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum EnumMappingRange {
    Value(i64),
    Range(RangeInclusive<i64>),
}

impl EnumMappingRange {
    pub fn contains(&self, v: i64) -> bool {
        match self {
            EnumMappingRange::Value(x) => *x == v,
            EnumMappingRange::Range(r) => r.contains(&v),
        }
    }
}

#[derive(Clone, PartialEq, Hash, Debug)]
pub struct EnumDecl {
    pub integer: IntegerDecl,
    pub mappings: BTreeMap<String, Vec<EnumMappingRange>>,
}

impl EnumDecl {
    pub fn label_for(&self, v: i64) -> Option<&str> {
        self.mappings
            .iter()
            .find(|(_, ranges)| ranges.iter().any(|r| r.contains(v)))
            .map(|(label, _)| label.as_str())
    }
}

#[derive(Clone, PartialEq, Hash, Debug)]
pub struct StructDecl {
    /// Named, ordered fields. Order matters: a variant/sequence field may
    /// only reference a field that appears earlier in this list.
    pub fields: Vec<(String, Declaration)>,
}

#[derive(Clone, PartialEq, Hash, Debug)]
pub struct VariantDecl {
    pub tag: FieldRef,
    /// Arms keyed by the tag enum's label.
    pub arms: Vec<(String, Declaration)>,
}

#[derive(Clone, PartialEq, Hash, Debug)]
pub struct ArrayDecl {
    pub length: usize,
    pub element: Box<Declaration>,
}

#[derive(Clone, PartialEq, Hash, Debug)]
pub struct SequenceDecl {
    pub length: FieldRef,
    pub element: Box<Declaration>,
}

/// A type description: one of spec.md §3's eight type classes.
#[derive(Clone, PartialEq, Hash, Debug)]
pub enum Declaration {
    Integer(IntegerDecl),
    Float(FloatDecl),
    Enum(EnumDecl),
    String,
    Struct(StructDecl),
    Variant(VariantDecl),
    Array(ArrayDecl),
    Sequence(SequenceDecl),
}

impl Declaration {
    pub fn integer(size: usize, signed: bool) -> Self {
        Declaration::Integer(IntegerDecl {
            size,
            signed,
            byte_order: None,
            base: PreferredDisplayBase::default(),
        })
    }

    pub fn as_integer(&self) -> Option<&IntegerDecl> {
        match self {
            Declaration::Integer(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDecl> {
        match self {
            Declaration::Enum(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructDecl> {
        match self {
            Declaration::Struct(d) => Some(d),
            _ => None,
        }
    }
}
