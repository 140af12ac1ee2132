//! Component C: type-class-dispatched decode (spec.md §4.C).
//!
//! Walks a [`Declaration`] tree, reading bits from a [`Cursor`] and placing
//! each decoded value into a [`Scope`] arena as it goes. Compound types
//! (struct, variant, array, sequence) use [`Scope::reserve`]/[`Scope::fill`]
//! so a child definition can be created with a valid parent id before the
//! compound's own value is known.

use crate::bitpos::Cursor;
use crate::decl::Declaration;
use crate::error::Error;
use crate::scope::{Scope, ScopeId, Value};
use crate::types::ByteOrder;
use internment::Intern;

/// Decodes one instance of `decl` at the cursor's current position, placing
/// it (and any children) into `scope` under `parent` at `field_index`, and
/// returns its [`ScopeId`].
pub fn decode(
    cursor: &mut Cursor,
    scope: &mut Scope,
    decl: &Declaration,
    trace_byte_order: ByteOrder,
    parent: Option<ScopeId>,
    field_index: u32,
    name: &str,
) -> Result<ScopeId, Error> {
    match decl {
        Declaration::Integer(d) => {
            let byte_order = d.byte_order.unwrap_or(trace_byte_order);
            let value = if d.signed {
                Value::Int(cursor.read_int(d.size, byte_order)?)
            } else {
                Value::UInt(cursor.read_uint(d.size, byte_order)?)
            };
            Ok(scope.push(parent, field_index, name, value))
        }
        Declaration::Float(d) => {
            let byte_order = d.byte_order.unwrap_or(trace_byte_order);
            let value = match d.size {
                32 => Value::Float(cursor.read_f32(byte_order)? as f64),
                64 => Value::Float(cursor.read_f64(byte_order)?),
                other => return Err(Error::InvalidFloatSize(other)),
            };
            Ok(scope.push(parent, field_index, name, value))
        }
        Declaration::Enum(d) => {
            let byte_order = d.integer.byte_order.unwrap_or(trace_byte_order);
            let raw = if d.integer.signed {
                cursor.read_int(d.integer.size, byte_order)?
            } else {
                cursor.read_uint(d.integer.size, byte_order)? as i64
            };
            let label = d.label_for(raw).map(|l| Intern::new(l.to_owned()));
            Ok(scope.push(parent, field_index, name, Value::Enum(raw, label)))
        }
        Declaration::String => {
            let s = cursor.read_cstring()?;
            Ok(scope.push(parent, field_index, name, Value::Str(s)))
        }
        Declaration::Struct(d) => {
            let id = scope.reserve(parent, field_index, name);
            let mut fields = Vec::with_capacity(d.fields.len());
            for (i, (field_name, field_decl)) in d.fields.iter().enumerate() {
                let child = decode(
                    cursor,
                    scope,
                    field_decl,
                    trace_byte_order,
                    Some(id),
                    i as u32,
                    field_name,
                )?;
                fields.push((Intern::new(field_name.clone()), child));
            }
            scope.fill(id, Value::Struct(fields));
            Ok(id)
        }
        Declaration::Variant(d) => {
            let id = scope.reserve(parent, field_index, name);
            let tag_scope = parent.ok_or_else(|| Error::UnresolvedFieldRef(d.tag.0.clone()))?;
            let tag_id = scope
                .resolve_ref(tag_scope, &d.tag)
                .ok_or_else(|| Error::UnresolvedFieldRef(d.tag.0.clone()))?;
            let (_, label) = match scope.value(tag_id) {
                Value::Enum(v, label) => (*v, *label),
                _ => return Err(Error::UnresolvedFieldRef(d.tag.0.clone())),
            };
            let label = label.ok_or_else(|| Error::UnresolvedFieldRef(d.tag.0.clone()))?;
            let (arm_name, arm_decl) = d
                .arms
                .iter()
                .find(|(n, _)| n == label.as_str())
                .ok_or_else(|| Error::UnresolvedFieldRef(format!("{}::{}", d.tag.0, label)))?;
            let child = decode(
                cursor,
                scope,
                arm_decl,
                trace_byte_order,
                Some(id),
                0,
                arm_name,
            )?;
            scope.fill(
                id,
                Value::Variant {
                    arm: Intern::new(arm_name.clone()),
                    child,
                },
            );
            Ok(id)
        }
        Declaration::Array(d) => {
            let id = scope.reserve(parent, field_index, name);
            let mut elements = Vec::with_capacity(d.length);
            for i in 0..d.length {
                elements.push(decode(
                    cursor,
                    scope,
                    &d.element,
                    trace_byte_order,
                    Some(id),
                    i as u32,
                    "element",
                )?);
            }
            scope.fill(id, Value::Array(elements));
            Ok(id)
        }
        Declaration::Sequence(d) => {
            let id = scope.reserve(parent, field_index, name);
            let len_scope = parent.ok_or_else(|| Error::UnresolvedFieldRef(d.length.0.clone()))?;
            let len_id = scope
                .resolve_ref(len_scope, &d.length)
                .ok_or_else(|| Error::UnresolvedFieldRef(d.length.0.clone()))?;
            let len = scope
                .get_unsigned_int(len_id)
                .ok_or_else(|| Error::UnresolvedFieldRef(d.length.0.clone()))? as usize;
            let mut elements = Vec::with_capacity(len);
            for i in 0..len {
                elements.push(decode(
                    cursor,
                    scope,
                    &d.element,
                    trace_byte_order,
                    Some(id),
                    i as u32,
                    "element",
                )?);
            }
            scope.fill(id, Value::Sequence(elements));
            Ok(id)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bitpos::Mode;
    use crate::decl::{Declaration, EnumDecl, FieldRef, IntegerDecl, StructDecl, VariantDecl};
    use crate::types::PreferredDisplayBase;
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::sync::Arc;

    fn cursor_over(bytes: &[u8]) -> Cursor {
        let mut f = tempfile::tempfile().unwrap();
        f.write_all(bytes).unwrap();
        let mut cursor = Cursor::init(Arc::new(f), Mode::ReadOnly);
        cursor
            .map_packet(0, bytes.len() * 8, bytes.len() * 8, 0)
            .unwrap();
        cursor
    }

    #[test]
    fn decodes_flat_struct() {
        let mut cursor = cursor_over(&[0x00, 0x00, 0x00, 0x2A, 0xFF]);
        let mut scope = Scope::new();
        let decl = Declaration::Struct(StructDecl {
            fields: vec![
                ("a".into(), Declaration::integer(32, false)),
                ("b".into(), Declaration::integer(8, false)),
            ],
        });
        let id = decode(&mut cursor, &mut scope, &decl, ByteOrder::Big, None, 0, "root").unwrap();
        assert_eq!(scope.lookup_integer(id, "a"), Some(42));
        assert_eq!(scope.lookup_integer(id, "b"), Some(255));
    }

    #[test]
    fn decodes_variant_by_tag() {
        let mut cursor = cursor_over(&[0x01, 0x00, 0x00, 0x00, 0x07]);
        let mut scope = Scope::new();
        let mut mappings = BTreeMap::new();
        mappings.insert(
            "b".to_owned(),
            vec![crate::decl::EnumMappingRange::Value(1)],
        );
        let tag = IntegerDecl {
            size: 8,
            signed: false,
            byte_order: None,
            base: PreferredDisplayBase::Decimal,
        };
        let decl = Declaration::Struct(StructDecl {
            fields: vec![
                (
                    "tag".into(),
                    Declaration::Enum(EnumDecl {
                        integer: tag,
                        mappings,
                    }),
                ),
                (
                    "u".into(),
                    Declaration::Variant(VariantDecl {
                        tag: FieldRef::new("tag"),
                        arms: vec![("b".into(), Declaration::integer(32, false))],
                    }),
                ),
            ],
        });
        let id = decode(&mut cursor, &mut scope, &decl, ByteOrder::Big, None, 0, "root").unwrap();
        let u = scope.find_child(id, "u").unwrap();
        match scope.value(u) {
            Value::Variant { arm, child } => {
                assert_eq!(arm.as_str(), "b");
                assert_eq!(scope.get_unsigned_int(*child), Some(7));
            }
            other => panic!("expected variant, got {other:?}"),
        }
    }
}
