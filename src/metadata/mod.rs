//! Component D: metadata acquisition (spec.md §4.D).
//!
//! Reads the `metadata` file in a trace directory, which is either a plain
//! TSDL text document or a sequence of binary-framed packets each wrapping a
//! chunk of that same text. Either way the end result handed to a
//! [`MetadataSource`] is one concatenated text buffer.
//!
//! This module owns the framing; it knows nothing about TSDL grammar. The
//! grammar lives behind the [`MetadataSource`] trait — see
//! `SPEC_FULL.md §1.1` for why this crate ships exactly one implementation
//! of it, [`text::TextMetadataParser`].

pub mod text;

use crate::decl::Declaration;
use crate::error::Error;
use crate::types::{ByteOrder, TSDL_MAGIC};
use byteordered::{ByteOrdered, Endianness};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor as IoCursor, Read};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// A trace clock declaration (spec.md glossary "clock").
#[derive(Clone, Debug, Default)]
pub struct ClockDecl {
    pub uuid: Option<Uuid>,
    pub description: Option<String>,
    pub freq: u64,
    pub offset: i64,
    pub precision: u64,
}

#[derive(Clone, Debug)]
pub struct EventClassDecl {
    pub id: u64,
    pub name: String,
    pub context: Option<Declaration>,
    pub fields: Declaration,
}

#[derive(Clone, Debug)]
pub struct StreamClassDecl {
    pub id: u64,
    pub event_header: Option<Declaration>,
    pub event_context: Option<Declaration>,
    pub packet_context: Option<Declaration>,
    pub events: BTreeMap<u64, EventClassDecl>,
}

/// Everything component H needs out of the metadata document: the trace's
/// identity, its byte order, its clocks, and its stream/event class tables
/// (spec.md §3 "trace descriptor" / "stream-class descriptor" / "event-class
/// descriptor").
#[derive(Clone, Debug)]
pub struct TraceMetadata {
    pub uuid: Option<Uuid>,
    pub byte_order: ByteOrder,
    pub packet_header: Option<Declaration>,
    pub clocks: BTreeMap<String, ClockDecl>,
    pub streams: BTreeMap<u64, StreamClassDecl>,
}

/// The contract between this crate's framing/lifecycle logic and a TSDL
/// grammar implementation (spec.md §1.1 / `SPEC_FULL.md §1.1`).
pub trait MetadataSource {
    fn parse(&self, text: &str) -> Result<TraceMetadata, Error>;
}

const PACKET_HEADER_LEN: usize = 4 + 16 + 4 + 4 + 4 + 1 + 1 + 1 + 1 + 1;

/// Reads and concatenates the `metadata` file in `trace_dir`, then hands the
/// result to `source` for parsing (spec.md §4.D).
pub fn open<S: MetadataSource>(trace_dir: &Path, source: &S) -> Result<TraceMetadata, Error> {
    let path = trace_dir.join("metadata");
    if !path.is_file() {
        return Err(Error::NotFound(path));
    }
    let mut raw = Vec::new();
    File::open(&path)?.read_to_end(&mut raw)?;

    let text = if let Some(byte_order) = sniff_packet_framing(&raw) {
        read_packet_framed(&raw, byte_order)?
    } else {
        if !raw.starts_with(b"/* CTF") {
            warn!("metadata file has no leading '/* CTF x.y' text header; parsing as TSDL anyway");
        }
        String::from_utf8_lossy(&raw).into_owned()
    };

    source.parse(&text)
}

/// Returns `Some(byte_order)` if the first four bytes of `raw` match
/// [`TSDL_MAGIC`] under that byte order, identifying packet-framed binary
/// metadata; `None` means plain text metadata.
fn sniff_packet_framing(raw: &[u8]) -> Option<ByteOrder> {
    if raw.len() < 4 {
        return None;
    }
    let le = u32::from_le_bytes(raw[0..4].try_into().unwrap());
    if le == TSDL_MAGIC {
        return Some(ByteOrder::Little);
    }
    let be = u32::from_be_bytes(raw[0..4].try_into().unwrap());
    if be == TSDL_MAGIC {
        return Some(ByteOrder::Big);
    }
    None
}

fn read_packet_framed(raw: &[u8], byte_order: ByteOrder) -> Result<String, Error> {
    let endianness: Endianness = byte_order.into();
    let mut text = String::new();
    let mut trace_uuid: Option<Uuid> = None;
    let mut pos = 0usize;

    while pos < raw.len() {
        if raw.len() - pos < PACKET_HEADER_LEN {
            break;
        }
        let mut r = ByteOrdered::runtime(IoCursor::new(&raw[pos..]), endianness);
        let magic = r.read_u32()?;
        if magic != TSDL_MAGIC {
            return Err(Error::BadMetadataMagic { found: magic });
        }
        let mut uuid_bytes = [0u8; 16];
        r.read_exact(&mut uuid_bytes)?;
        let uuid = Uuid::from_bytes(uuid_bytes);
        let checksum = r.read_u32()?;
        let content_size_bits = r.read_u32()? as usize;
        let packet_size_bits = r.read_u32()? as usize;
        let compression_scheme = r.read_u8()?;
        let encryption_scheme = r.read_u8()?;
        let checksum_scheme = r.read_u8()?;
        let major = r.read_u8()?;
        let minor = r.read_u8()?;

        if compression_scheme != 0 {
            return Err(Error::UnsupportedFraming("compressed metadata packets"));
        }
        if encryption_scheme != 0 {
            return Err(Error::UnsupportedFraming("encrypted metadata packets"));
        }
        if checksum_scheme != 0 {
            return Err(Error::UnsupportedFraming("checksummed metadata packets"));
        }
        if checksum != 0 {
            warn!(checksum, "metadata packet declares a non-zero checksum; not verified");
        }
        if (major, minor) != (1, 8) {
            warn!(major, minor, "metadata packet declares an unexpected TSDL version");
        }

        match trace_uuid {
            None => trace_uuid = Some(uuid),
            Some(expected) if expected != uuid => {
                return Err(Error::UuidMismatch {
                    expected,
                    found: uuid,
                })
            }
            Some(_) => {}
        }

        let content_bytes = content_size_bits / 8 - PACKET_HEADER_LEN;
        let content_start = pos + PACKET_HEADER_LEN;
        let content_end = content_start + content_bytes;
        if content_end > raw.len() {
            return Err(Error::BadPacketSize(
                "metadata packet content runs past end of file".into(),
            ));
        }
        text.push_str(&String::from_utf8_lossy(&raw[content_start..content_end]));

        pos += packet_size_bits / 8;
    }

    Ok(text)
}
