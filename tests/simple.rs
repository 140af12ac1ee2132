//! Scenario 1 (spec.md §8): single packet, single event, round-trips a
//! `u32` payload field.

use byteordered::byteorder::WriteBytesExt;
use byteordered::{ByteOrdered, Endianness};
use ctf_trace_core::Trace;
use pretty_assertions::assert_eq;
use std::io::Write;
use test_log::test;
use uuid::Uuid;

const TRACE_UUID: &str = "79e49040-21b5-42d4-a83b-646f78666b62";

const METADATA: &str = r#"
    /* CTF 1.8 */
    trace {
        major = 1;
        minor = 8;
        uuid = "79e49040-21b5-42d4-a83b-646f78666b62";
        byte_order = be;
        packet.header := struct {
            integer { size = 32; signed = false; } magic;
            integer { size = 8; signed = false; } uuid[16];
            integer { size = 64; signed = false; } stream_id;
        };
    };

    stream {
        id = 0;
        packet.context := struct {
            integer { size = 32; signed = false; } content_size;
            integer { size = 32; signed = false; } packet_size;
            integer { size = 32; signed = false; } events_discarded;
        };
        event.header := struct {
            integer { size = 8; signed = false; } id;
        };
    };

    event {
        stream_id = 0;
        id = 0;
        name = "frame";
        fields := struct {
            integer { size = 32; signed = false; } x;
        };
    };
"#;

#[test]
fn simple_trace_single_packet_single_event() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("metadata"), METADATA).unwrap();

    let uuid = Uuid::parse_str(TRACE_UUID).unwrap();
    let mut bytes = Vec::new();
    {
        let mut w = ByteOrdered::runtime(&mut bytes, Endianness::Big);
        w.write_u32(ctf_trace_core::types::CTF_MAGIC_NUMBER).unwrap();
        w.write_all(uuid.as_bytes()).unwrap();
        w.write_u64(0).unwrap(); // stream_id
        w.write_u32(360).unwrap(); // content_size (bits)
        w.write_u32(360).unwrap(); // packet_size (bits)
        w.write_u32(0).unwrap(); // events_discarded
        w.write_u8(0).unwrap(); // event id
        w.write_u32(0xDEAD_BEEF).unwrap(); // x
    }
    std::fs::write(dir.path().join("stream"), &bytes).unwrap();

    let mut trace = Trace::open(dir.path()).unwrap();
    assert_eq!(trace.file_streams().len(), 1);
    assert_eq!(trace.uuid, Some(uuid));

    let event = trace.next_event(0).unwrap().expect("one event");
    assert_eq!(event.id, 0);
    assert_eq!(event.name.as_str(), "frame");
    assert_eq!(event.payload.len(), 1);
    assert_eq!(event.payload[0].0.as_str(), "x");
    assert_eq!(event.payload[0].1.as_unsigned_int(), Some(0xDEAD_BEEF));

    assert!(trace.next_event(0).unwrap().is_none());
}
