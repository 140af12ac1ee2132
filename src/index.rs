//! Components E (packet indexer) and F (packet seek/iterator), spec.md
//! §4.E/§4.F.

use crate::bitpos::{Cursor as BitCursor, Mode as BitMode};
use crate::decl::Declaration;
use crate::dispatch;
use crate::error::Error;
use crate::metadata::StreamClassDecl;
use crate::scope::Scope;
use crate::types::{ByteOrder, CTF_MAGIC_NUMBER};
use std::collections::BTreeMap;
use std::fs::File;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// One packet's indexed metadata (spec.md §3 "Packet index entry"). Built
/// once at open and immutable thereafter.
#[derive(Copy, Clone, Debug)]
pub struct PacketIndexEntry {
    pub file_byte_offset: u64,
    pub content_bits: usize,
    pub packet_bits: usize,
    pub timestamp_begin: u64,
    pub timestamp_end: u64,
    pub data_offset_bits: usize,
    pub events_discarded_cumulative: u64,
}

/// Walks every packet of `file`, validating headers and building an index
/// (spec.md §4.E). Returns the stream id shared by every packet (invariant
/// 3) and the index itself.
pub fn build(
    file: &Arc<File>,
    file_size: u64,
    trace_uuid: Option<Uuid>,
    trace_byte_order: ByteOrder,
    packet_header_decl: Option<&Declaration>,
    stream_classes: &BTreeMap<u64, StreamClassDecl>,
) -> Result<(u64, Vec<PacketIndexEntry>), Error> {
    let mut cursor = BitCursor::init(Arc::clone(file), BitMode::ReadOnly);
    let mut mmap_offset = 0u64;
    let mut entries = Vec::new();
    let mut stream_id_for_file: Option<u64> = None;

    while mmap_offset < file_size {
        cursor.map_header_window(mmap_offset, file_size)?;
        let mut scope = Scope::new();
        let mut stream_id = 0u64;

        if let Some(header_decl) = packet_header_decl {
            let id = dispatch::decode(
                &mut cursor,
                &mut scope,
                header_decl,
                trace_byte_order,
                None,
                0,
                "trace.packet.header",
            )?;
            if let Some(magic) = scope.lookup_integer(id, "magic") {
                if magic as u32 != CTF_MAGIC_NUMBER {
                    return Err(Error::BadMagic { found: magic as u32 });
                }
            }
            if let Some(uuid_field) = scope.find_child(id, "uuid") {
                let found = extract_uuid(&scope, uuid_field)?;
                match trace_uuid {
                    Some(expected) if expected != found => {
                        return Err(Error::UuidMismatch { expected, found })
                    }
                    _ => {}
                }
            }
            if let Some(sid) = scope.lookup_integer(id, "stream_id") {
                stream_id = sid as u64;
            }
        }

        match stream_id_for_file {
            Some(expected) if expected != stream_id => {
                return Err(Error::StreamIdChange {
                    expected,
                    found: stream_id,
                })
            }
            Some(_) => {}
            None => stream_id_for_file = Some(stream_id),
        }

        let stream_class = stream_classes
            .get(&stream_id)
            .ok_or(Error::UnknownStream(stream_id))?;

        let remaining_bits = ((file_size - mmap_offset) * 8) as usize;
        let mut content_bits = remaining_bits;
        let mut packet_bits = remaining_bits;
        let mut timestamp_begin = 0u64;
        let mut timestamp_end = 0u64;
        let mut events_discarded_cumulative = 0u64;

        if let Some(ctx_decl) = &stream_class.packet_context {
            let ctx_id = dispatch::decode(
                &mut cursor,
                &mut scope,
                ctx_decl,
                trace_byte_order,
                None,
                0,
                "stream.packet.context",
            )?;
            if let Some(v) = scope.lookup_integer(ctx_id, "content_size") {
                content_bits = v as usize;
            }
            if let Some(v) = scope.lookup_integer(ctx_id, "packet_size") {
                packet_bits = v as usize;
            }
            if let Some(v) = scope.lookup_integer(ctx_id, "timestamp_begin") {
                timestamp_begin = v as u64;
            }
            if let Some(v) = scope.lookup_integer(ctx_id, "timestamp_end") {
                timestamp_end = v as u64;
            }
            if let Some(v) = scope.lookup_integer(ctx_id, "events_discarded") {
                events_discarded_cumulative = v as u64;
            }
        }

        let data_offset_bits = cursor.bit_offset().ok_or(Error::Eof)?;

        if data_offset_bits > content_bits
            || content_bits > packet_bits
            || packet_bits > remaining_bits
        {
            return Err(Error::BadPacketSize(format!(
                "packet at file offset {mmap_offset}: data_offset={data_offset_bits} content={content_bits} packet={packet_bits}"
            )));
        }

        entries.push(PacketIndexEntry {
            file_byte_offset: mmap_offset,
            content_bits,
            packet_bits,
            timestamp_begin,
            timestamp_end,
            data_offset_bits,
            events_discarded_cumulative,
        });

        mmap_offset += (packet_bits / 8) as u64;
    }

    cursor.finalize();
    Ok((stream_id_for_file.unwrap_or(0), entries))
}

fn extract_uuid(scope: &Scope, id: crate::scope::ScopeId) -> Result<Uuid, Error> {
    let len = scope
        .array_len(id)
        .ok_or_else(|| Error::BadPacketSize("uuid field is not an array".into()))?;
    if len != 16 {
        return Err(Error::BadPacketSize(format!(
            "uuid field has length {len}, expected 16"
        )));
    }
    let mut bytes = [0u8; 16];
    for (i, b) in bytes.iter_mut().enumerate() {
        let elem = scope.array_index(id, i).unwrap();
        *b = scope.get_unsigned_int(elem).unwrap_or(0) as u8;
    }
    Ok(Uuid::from_bytes(bytes))
}

/// Where to move to (spec.md §4.F's `SEEK_CUR`/`SEEK_SET`).
pub enum Whence {
    Start(usize),
    Current,
}

/// Stateful packet navigator for one file stream (component F). Owns the
/// bit cursor; the packet header/context *values* are decoded into the
/// [`Scope`] the caller passes in (the same arena event reads use), so a
/// sequence or variant anywhere in the packet/event can reference the
/// `trace.packet.header`/`stream.packet.context` root scopes (`DESIGN.md`
/// #4) regardless of which decode call placed them there.
pub struct PacketCursor {
    entries: Vec<PacketIndexEntry>,
    bitpos: BitCursor,
    trace_byte_order: ByteOrder,
    packet_header_decl: Option<Declaration>,
    packet_context_decl: Option<Declaration>,
    cur_index: usize,
    prev_timestamp: u64,
    prev_timestamp_end: u64,
    header_id: Option<crate::scope::ScopeId>,
    context_id: Option<crate::scope::ScopeId>,
}

impl PacketCursor {
    pub fn new(
        file: Arc<File>,
        entries: Vec<PacketIndexEntry>,
        trace_byte_order: ByteOrder,
        packet_header_decl: Option<Declaration>,
        packet_context_decl: Option<Declaration>,
    ) -> Self {
        Self {
            entries,
            bitpos: BitCursor::init(file, BitMode::ReadOnly),
            trace_byte_order,
            packet_header_decl,
            packet_context_decl,
            cur_index: 0,
            prev_timestamp: 0,
            prev_timestamp_end: 0,
            header_id: None,
            context_id: None,
        }
    }

    pub fn packet_count(&self) -> usize {
        self.entries.len()
    }

    pub fn current_entry(&self) -> Option<&PacketIndexEntry> {
        self.entries.get(self.cur_index)
    }

    pub fn bitpos(&mut self) -> &mut BitCursor {
        &mut self.bitpos
    }

    pub fn header_id(&self) -> Option<crate::scope::ScopeId> {
        self.header_id
    }

    pub fn context_id(&self) -> Option<crate::scope::ScopeId> {
        self.context_id
    }

    /// Positions at packet 0; used once after indexing (spec.md §4.E's "After
    /// the loop, reposition to packet 0").
    pub fn prime(&mut self, scope: &mut Scope) -> Result<(), Error> {
        self.seek(Whence::Start(0), 0, scope)
    }

    /// Implements spec.md §4.F. `running_timestamp` is the file-stream's
    /// current reconstructed clock, used to update `prev_timestamp` on a
    /// `Current` seek. `scope` is the file stream's persistent definition
    /// arena; packet header/context values are (re-)placed into it here.
    pub fn seek(&mut self, whence: Whence, running_timestamp: u64, scope: &mut Scope) -> Result<(), Error> {
        match whence {
            Whence::Current => {
                if let Some(entry) = self.current_entry().copied() {
                    self.prev_timestamp = running_timestamp;
                    self.prev_timestamp_end = entry.timestamp_end;
                }
                self.cur_index += 1;
            }
            Whence::Start(index) => {
                self.cur_index = index;
                self.prev_timestamp = 0;
                self.prev_timestamp_end = 0;
            }
        }

        if self.cur_index >= self.entries.len() {
            let pending = self.pending_discarded();
            if pending > 0 {
                warn!(
                    pending,
                    prev_timestamp = self.prev_timestamp,
                    prev_timestamp_end = self.prev_timestamp_end,
                    "{pending} events discarded between timestamps {} and {}",
                    self.prev_timestamp,
                    self.prev_timestamp_end,
                );
            }
            self.bitpos.set_eof();
            return Ok(());
        }

        let entry = self.entries[self.cur_index];
        self.bitpos
            .map_packet(entry.file_byte_offset, entry.packet_bits, entry.content_bits, self.cur_index)?;
        self.decode_header_and_context(scope)?;

        if entry.data_offset_bits == entry.content_bits {
            return self.seek(Whence::Current, running_timestamp, scope);
        }
        Ok(())
    }

    /// The events-discarded delta attributable to the boundary the most
    /// recently indexed packet introduced, per the cumulative-counter
    /// reading recorded in `DESIGN.md`'s Open Question 2.
    fn pending_discarded(&self) -> u64 {
        match self.entries.len() {
            0 => 0,
            1 => self.entries[0].events_discarded_cumulative,
            n => self.entries[n - 1]
                .events_discarded_cumulative
                .saturating_sub(self.entries[n - 2].events_discarded_cumulative),
        }
    }

    /// The delta attributable to having just moved into the current packet,
    /// i.e. the number of events discarded between the previous packet and
    /// this one (spec.md §4.F / scenario 3).
    pub fn discarded_delta_entering_current(&self) -> u64 {
        match self.cur_index {
            0 => self
                .entries
                .first()
                .map(|e| e.events_discarded_cumulative)
                .unwrap_or(0),
            i => {
                let cur = self.entries[i].events_discarded_cumulative;
                let prev = self.entries[i - 1].events_discarded_cumulative;
                cur.saturating_sub(prev)
            }
        }
    }

    fn decode_header_and_context(&mut self, scope: &mut Scope) -> Result<(), Error> {
        let header_id = match &self.packet_header_decl {
            Some(decl) => Some(dispatch::decode(
                &mut self.bitpos,
                scope,
                decl,
                self.trace_byte_order,
                None,
                0,
                "trace.packet.header",
            )?),
            None => None,
        };
        if let Some(id) = header_id {
            scope.register_root("trace.packet.header", id);
        }
        let context_id = match &self.packet_context_decl {
            Some(decl) => Some(dispatch::decode(
                &mut self.bitpos,
                scope,
                decl,
                self.trace_byte_order,
                None,
                0,
                "stream.packet.context",
            )?),
            None => None,
        };
        if let Some(id) = context_id {
            scope.register_root("stream.packet.context", id);
        }
        self.header_id = header_id;
        self.context_id = context_id;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decl::{IntegerDecl, StructDecl};
    use crate::types::PreferredDisplayBase;
    use byteordered::byteorder::WriteBytesExt;
    use byteordered::{ByteOrdered, Endianness};
    use std::io::{Seek, SeekFrom, Write};

    fn int_field(name: &str, size: usize, signed: bool) -> (String, Declaration) {
        (
            name.to_owned(),
            Declaration::Integer(IntegerDecl {
                size,
                signed,
                byte_order: None,
                base: PreferredDisplayBase::Decimal,
            }),
        )
    }

    #[test]
    fn builds_single_packet_index() {
        let mut f = tempfile::tempfile().unwrap();
        {
            let mut w = ByteOrdered::runtime(&mut f, Endianness::Big);
            w.write_u32(CTF_MAGIC_NUMBER).unwrap();
            w.write_u32(42).unwrap(); // x
        }
        f.seek(SeekFrom::Start(0)).unwrap();
        let file_size = f.metadata().unwrap().len();
        let file = Arc::new(f);

        let header_decl = Declaration::Struct(StructDecl {
            fields: vec![int_field("magic", 32, false)],
        });

        let mut streams = BTreeMap::new();
        streams.insert(
            0u64,
            StreamClassDecl {
                id: 0,
                event_header: None,
                event_context: None,
                packet_context: None,
                events: BTreeMap::new(),
            },
        );

        let (stream_id, entries) = build(
            &file,
            file_size,
            None,
            ByteOrder::Big,
            Some(&header_decl),
            &streams,
        )
        .unwrap();
        assert_eq!(stream_id, 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].data_offset_bits, 32);
    }
}
