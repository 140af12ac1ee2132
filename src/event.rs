//! Component G: event reader (spec.md §4.G).

use crate::decl::Declaration;
use crate::dispatch;
use crate::error::Error;
use crate::index::{PacketCursor, Whence};
use crate::metadata::StreamClassDecl;
use crate::scope::{Scope, ScopeId};
use crate::types::{ByteOrder, EventId, FieldValue, PrimitiveFieldValue, Timestamp};
use internment::Intern;

/// Per-file-stream event-reading state (spec.md §3 "File stream"'s mutable
/// fields): the reconstructed clock and the discard/last-id bookkeeping the
/// event reader updates.
#[derive(Default)]
pub struct EventReadState {
    pub timestamp: Timestamp,
    pub prev_timestamp: Timestamp,
    pub last_event_id: Option<EventId>,
}

pub enum Outcome {
    Event(crate::types::Event),
    Eof,
}

/// Implements spec.md §4.G's nine steps against `packets`' current mapped
/// packet, sharing `scope` with the packet header/context decode so field
/// references can cross between them (`DESIGN.md` #4).
pub fn read(
    packets: &mut PacketCursor,
    stream_class: &StreamClassDecl,
    scope: &mut Scope,
    state: &mut EventReadState,
    trace_byte_order: ByteOrder,
) -> Result<Outcome, Error> {
    if packets.bitpos().is_eof() {
        return Ok(Outcome::Eof);
    }

    packets.bitpos().get_event()?;
    packets.bitpos().save_restore_point();

    if packets.bitpos().is_eof() {
        return Ok(Outcome::Eof);
    }

    let content_size = packets.bitpos().content_size;
    let offset = packets.bitpos().bit_offset().ok_or(Error::Eof)?;
    if offset >= content_size {
        packets.seek(Whence::Current, state.timestamp, scope)?;
        return read(packets, stream_class, scope, state, trace_byte_order);
    }

    let mut has_timestamp = false;
    let mut event_id: EventId = 0;

    if let Some(header_decl) = &stream_class.event_header {
        let id = dispatch::decode(
            packets.bitpos(),
            scope,
            header_decl,
            trace_byte_order,
            None,
            0,
            "stream.event.header",
        )?;
        scope.register_root("stream.event.header", id);

        event_id = resolve_header_field(scope, id, "id").unwrap_or(0) as u64;
        if let Some(raw) = resolve_header_field(scope, id, "timestamp") {
            update_timestamp(state, raw as u64, header_field_len(stream_class, "timestamp"));
            has_timestamp = true;
        }
    }

    let event_context_id = if let Some(context_decl) = &stream_class.event_context {
        let id = dispatch::decode(
            packets.bitpos(),
            scope,
            context_decl,
            trace_byte_order,
            None,
            0,
            "stream.event.context",
        )?;
        scope.register_root("stream.event.context", id);
        Some(id)
    } else {
        None
    };

    let event_class = stream_class
        .events
        .get(&event_id)
        .ok_or(Error::InvalidEventId(event_id))?;

    let ctx_id = if let Some(context_decl) = &event_class.context {
        let id = dispatch::decode(
            packets.bitpos(),
            scope,
            context_decl,
            trace_byte_order,
            None,
            0,
            "event.context",
        )?;
        scope.register_root("event.context", id);
        Some(id)
    } else {
        None
    };

    let fields_id = dispatch::decode(
        packets.bitpos(),
        scope,
        &event_class.fields,
        trace_byte_order,
        None,
        0,
        "event.fields",
    )?;
    scope.register_root("event.fields", fields_id);

    state.last_event_id = Some(event_id);

    Ok(Outcome::Event(crate::types::Event {
        id: event_id,
        name: Intern::new(event_class.name.clone()),
        timestamp: has_timestamp.then_some(state.timestamp),
        stream_context: event_context_id
            .map(|id| flatten_struct(scope, id))
            .unwrap_or_default(),
        context: ctx_id.map(|id| flatten_struct(scope, id)).unwrap_or_default(),
        payload: flatten_struct(scope, fields_id),
    }))
}

/// Looks up `name` at the top level of the header struct, then inside a
/// variant field named `v` (spec.md §4.G step 4's "id"/"timestamp" lookup
/// order).
fn resolve_header_field(scope: &Scope, header_id: ScopeId, name: &str) -> Option<i64> {
    if let Some(id) = scope.find_child(header_id, name) {
        if let Some(v) = scope.get_signed_int(id) {
            return Some(v);
        }
    }
    let v_id = scope.find_child(header_id, "v")?;
    let field_id = scope.find_child(v_id, name)?;
    scope.get_signed_int(field_id)
}

fn header_field_len(stream_class: &StreamClassDecl, name: &str) -> usize {
    fn find_len(decl: &Declaration, name: &str) -> Option<usize> {
        match decl {
            Declaration::Struct(s) => s.fields.iter().find_map(|(n, d)| {
                if n == name {
                    decl_bit_len(d)
                } else if n == "v" {
                    find_len(d, name)
                } else {
                    None
                }
            }),
            Declaration::Variant(v) => v.arms.iter().find_map(|(_, d)| find_len(d, name)),
            _ => None,
        }
    }
    fn decl_bit_len(decl: &Declaration) -> Option<usize> {
        match decl {
            Declaration::Integer(i) => Some(i.size),
            Declaration::Enum(e) => Some(e.integer.size),
            _ => None,
        }
    }
    stream_class
        .event_header
        .as_ref()
        .and_then(|d| find_len(d, name))
        .unwrap_or(64)
}

/// Timestamp wrap-reconstruction (spec.md §4.G, final paragraph).
fn update_timestamp(state: &mut EventReadState, field: u64, bit_len: usize) {
    state.prev_timestamp = state.timestamp;
    if bit_len >= 64 {
        state.timestamp = field;
        return;
    }
    let mask = (1u64 << bit_len) - 1;
    let old_low = state.timestamp & mask;
    let mut new_low = field;
    if new_low < old_low {
        new_low += 1u64 << bit_len;
    }
    state.timestamp = (state.timestamp & !mask) + new_low;
}

fn flatten_struct(scope: &Scope, id: ScopeId) -> Vec<(Intern<String>, FieldValue)> {
    match scope.value(id) {
        crate::scope::Value::Struct(fields) => fields
            .iter()
            .map(|(name, child)| (*name, to_field_value(scope, *child)))
            .collect(),
        _ => Vec::new(),
    }
}

fn to_field_value(scope: &Scope, id: ScopeId) -> FieldValue {
    match scope.value(id) {
        crate::scope::Value::UInt(v) => PrimitiveFieldValue::from(*v).into(),
        crate::scope::Value::Int(v) => PrimitiveFieldValue::from(*v).into(),
        crate::scope::Value::Float(v) => PrimitiveFieldValue::from(*v).into(),
        crate::scope::Value::Str(s) => PrimitiveFieldValue::from(s.as_str()).into(),
        crate::scope::Value::Enum(v, label) => {
            FieldValue::Primitive(PrimitiveFieldValue::Enumeration(
                *v,
                crate::types::PreferredDisplayBase::Decimal,
                *label,
            ))
        }
        crate::scope::Value::Array(elems) | crate::scope::Value::Sequence(elems) => {
            FieldValue::Array(
                elems
                    .iter()
                    .map(|e| match to_field_value(scope, *e) {
                        FieldValue::Primitive(p) => p,
                        FieldValue::Array(_) => PrimitiveFieldValue::String(String::new()),
                    })
                    .collect(),
            )
        }
        crate::scope::Value::Variant { child, .. } => to_field_value(scope, *child),
        crate::scope::Value::Struct(_) | crate::scope::Value::Unset => {
            FieldValue::Primitive(PrimitiveFieldValue::String(String::new()))
        }
    }
}
