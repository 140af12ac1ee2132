//! Scenarios 2, 3, 4, 5, 6 (spec.md §8).

use byteordered::byteorder::WriteBytesExt;
use byteordered::{ByteOrdered, Endianness};
use ctf_trace_core::{Error, Trace};
use pretty_assertions::assert_eq;
use std::io::Write;
use test_log::test;
use uuid::Uuid;

const TRACE_UUID: &str = "79e49040-21b5-42d4-a83b-646f78666b62";

fn metadata_with_32bit_timestamp() -> String {
    format!(
        r#"
        /* CTF 1.8 */
        trace {{
            major = 1;
            minor = 8;
            uuid = "{TRACE_UUID}";
            byte_order = be;
            packet.header := struct {{
                integer {{ size = 32; signed = false; }} magic;
                integer {{ size = 8; signed = false; }} uuid[16];
                integer {{ size = 64; signed = false; }} stream_id;
            }};
        }};

        stream {{
            id = 0;
            packet.context := struct {{
                integer {{ size = 32; signed = false; }} content_size;
                integer {{ size = 32; signed = false; }} packet_size;
                integer {{ size = 32; signed = false; }} events_discarded;
            }};
            event.header := struct {{
                integer {{ size = 8; signed = false; }} id;
                integer {{ size = 32; signed = false; }} timestamp;
            }};
        }};

        event {{
            stream_id = 0;
            id = 0;
            name = "tick";
            fields := struct {{
                integer {{ size = 8; signed = false; }} n;
            }};
        }};
        "#
    )
}

fn write_header(w: &mut ByteOrdered<&mut Vec<u8>, Endianness>, uuid: &Uuid, stream_id: u64) {
    w.write_u32(ctf_trace_core::types::CTF_MAGIC_NUMBER).unwrap();
    w.write_all(uuid.as_bytes()).unwrap();
    w.write_u64(stream_id).unwrap();
}

fn write_context(w: &mut ByteOrdered<&mut Vec<u8>, Endianness>, content_bits: u32, packet_bits: u32, discarded: u32) {
    w.write_u32(content_bits).unwrap();
    w.write_u32(packet_bits).unwrap();
    w.write_u32(discarded).unwrap();
}

/// Scenario 2: a 32-bit clock field wraps twice; the reconstructed 64-bit
/// timestamp must stay monotonic.
#[test]
fn timestamp_reconstruction_handles_32_bit_wrap() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("metadata"), metadata_with_32bit_timestamp()).unwrap();
    let uuid = Uuid::parse_str(TRACE_UUID).unwrap();

    // header (28 bytes) + context (12 bytes) = 40 bytes = 320 bits of header,
    // then 3 events of (1 + 4 + 1) bytes = 18 bytes = 144 bits content.
    let content_bits = 320 + 3 * (1 + 4 + 1) * 8;
    let mut bytes = Vec::new();
    {
        let mut w = ByteOrdered::runtime(&mut bytes, Endianness::Big);
        write_header(&mut w, &uuid, 0);
        write_context(&mut w, content_bits, content_bits, 0);
        for (id, ts, n) in [(0u8, 0x0000_0010u32, 1u8), (0, 0xFFFF_FFF0, 2), (0, 0x0000_0005, 3)] {
            w.write_u8(id).unwrap();
            w.write_u32(ts).unwrap();
            w.write_u8(n).unwrap();
        }
    }
    std::fs::write(dir.path().join("stream"), &bytes).unwrap();

    let mut trace = Trace::open(dir.path()).unwrap();
    let e0 = trace.next_event(0).unwrap().unwrap();
    let e1 = trace.next_event(0).unwrap().unwrap();
    let e2 = trace.next_event(0).unwrap().unwrap();
    assert!(trace.next_event(0).unwrap().is_none());

    assert_eq!(e0.timestamp, Some(0x10));
    assert_eq!(e1.timestamp, Some(0xFFFF_FFF0));
    assert_eq!(e2.timestamp, Some(0x1_0000_0005));
}

/// Scenario 3: two packets, the second declaring a cumulative
/// `events_discarded` of 3; both events are still readable in order.
#[test]
fn discarded_events_counter_does_not_block_reading() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("metadata"), metadata_with_32bit_timestamp()).unwrap();
    let uuid = Uuid::parse_str(TRACE_UUID).unwrap();

    let content_bits_per_packet = 320 + (1 + 4 + 1) * 8;
    let mut bytes = Vec::new();
    {
        let mut w = ByteOrdered::runtime(&mut bytes, Endianness::Big);
        write_header(&mut w, &uuid, 0);
        write_context(&mut w, content_bits_per_packet, content_bits_per_packet, 0);
        w.write_u8(0).unwrap();
        w.write_u32(0).unwrap();
        w.write_u8(1).unwrap();

        write_header(&mut w, &uuid, 0);
        write_context(&mut w, content_bits_per_packet, content_bits_per_packet, 3);
        w.write_u8(0).unwrap();
        w.write_u32(1).unwrap();
        w.write_u8(2).unwrap();
    }
    std::fs::write(dir.path().join("stream"), &bytes).unwrap();

    let mut trace = Trace::open(dir.path()).unwrap();
    assert_eq!(trace.file_streams()[0].packet_count(), 2);

    let e0 = trace.next_event(0).unwrap().unwrap();
    let e1 = trace.next_event(0).unwrap().unwrap();
    assert!(trace.next_event(0).unwrap().is_none());
    assert_eq!(e0.timestamp, Some(0));
    assert_eq!(e1.timestamp, Some(1));
}

/// Scenario 4: a stream packet header disagreeing with the trace UUID
/// fails open.
#[test]
fn uuid_mismatch_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("metadata"), metadata_with_32bit_timestamp()).unwrap();
    let wrong_uuid = Uuid::parse_str("00000000-0000-0000-0000-000000000000").unwrap();

    let content_bits = 320 + (1 + 4 + 1) * 8;
    let mut bytes = Vec::new();
    {
        let mut w = ByteOrdered::runtime(&mut bytes, Endianness::Big);
        write_header(&mut w, &wrong_uuid, 0);
        write_context(&mut w, content_bits, content_bits, 0);
        w.write_u8(0).unwrap();
        w.write_u32(0).unwrap();
        w.write_u8(1).unwrap();
    }
    std::fs::write(dir.path().join("stream"), &bytes).unwrap();

    let err = Trace::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::UuidMismatch { .. }));
}

/// Scenario 5: a binary-framed metadata packet declaring a nonzero
/// compression scheme is refused.
#[test]
fn compressed_metadata_packet_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let content = b"trace { byte_order = be; };";
    let header_len = 37usize;
    let total_bits = ((header_len + content.len()) * 8) as u32;

    let mut raw = Vec::new();
    {
        let mut w = ByteOrdered::runtime(&mut raw, Endianness::Big);
        w.write_u32(ctf_trace_core::types::TSDL_MAGIC).unwrap();
        w.write_all(Uuid::nil().as_bytes()).unwrap();
        w.write_u32(0).unwrap(); // checksum
        w.write_u32(total_bits).unwrap(); // content_size
        w.write_u32(total_bits).unwrap(); // packet_size
        w.write_u8(1).unwrap(); // compression_scheme != 0
        w.write_u8(0).unwrap(); // encryption_scheme
        w.write_u8(0).unwrap(); // checksum_scheme
        w.write_u8(1).unwrap(); // major
        w.write_u8(8).unwrap(); // minor
        w.write_all(content).unwrap();
    }
    std::fs::write(dir.path().join("metadata"), &raw).unwrap();
    std::fs::write(dir.path().join("stream"), []).unwrap();

    let err = Trace::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFraming(_)));
}

/// Scenario 6: text metadata missing the leading `/* CTF x.y` comment still
/// opens (warn and continue), adopting host byte order.
#[test]
fn text_metadata_without_leading_comment_still_opens() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("metadata"),
        r#"
        trace {
            byte_order = be;
        };

        stream {
            id = 0;
            event.header := struct {
                integer { size = 8; signed = false; } id;
            };
        };

        event {
            stream_id = 0;
            id = 0;
            name = "ping";
            fields := struct {};
        };
        "#,
    )
    .unwrap();

    let mut bytes = Vec::new();
    {
        let mut w = ByteOrdered::runtime(&mut bytes, Endianness::Big);
        w.write_u8(0).unwrap(); // event id
    }
    std::fs::write(dir.path().join("stream"), &bytes).unwrap();

    let mut trace = Trace::open(dir.path()).unwrap();
    let event = trace.next_event(0).unwrap().expect("one event");
    assert_eq!(event.name.as_str(), "ping");
}
