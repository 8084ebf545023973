//! End-to-end checks against a frame captured from the wire format.

use kelimelik_protocol::{
    ArrayValue, ElementType, Packet, ProtocolError, StreamParser, Value, decode_one, encode,
    verify,
};

// =========================================================================
// Fixture: "TestPacket" with a string array, a u64 array and a u64.
// =========================================================================

fn test_packet_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"\x00\x00\x00\x6f");
    bytes.extend_from_slice(b"\x00\x0ATestPacket");
    bytes.push(3);

    bytes.extend_from_slice(b"\x08\x00\x00\x00\x05\x07");
    for word in ["Hello", "World", "Testing", "the", "library"] {
        bytes.extend_from_slice(&(word.len() as u16).to_be_bytes());
        bytes.extend_from_slice(word.as_bytes());
    }

    bytes.extend_from_slice(b"\x08\x00\x00\x00\x05\x03");
    for n in 0u64..5 {
        bytes.extend_from_slice(&n.to_be_bytes());
    }

    bytes.push(3);
    bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    bytes
}

#[test]
fn test_fixture_size_prefix_counts_the_body() {
    let bytes = test_packet_bytes();
    assert_eq!(bytes.len(), 0x6f + 4);
}

#[test]
fn test_decode_fixture_slots() {
    let packet = decode_one(&test_packet_bytes()).unwrap();

    assert_eq!(packet.header(), "TestPacket");
    assert_eq!(packet.slot_count(), 3);

    let words = packet.array_at(0).unwrap();
    assert_eq!(words.element_type(), ElementType::Str);
    let words: Vec<_> = words.strs().unwrap().iter().map(|s| s.to_string()).collect();
    assert_eq!(words, ["Hello", "World", "Testing", "the", "library"]);

    assert_eq!(
        packet.array_at(1),
        Some(&ArrayValue::UInt64(vec![0, 1, 2, 3, 4]))
    );
    assert_eq!(packet.get(2), Some(&Value::UInt64(0x0102_0304_0506_0708)));
}

#[test]
fn test_fixture_verifies_as_sqq() {
    let packet = decode_one(&test_packet_bytes()).unwrap();
    verify(&packet, "SQq").unwrap();
    verify(&packet, "SIi").unwrap();
}

#[test]
fn test_fixture_rejects_other_formats() {
    let packet = decode_one(&test_packet_bytes()).unwrap();
    for format in ["SQ", "SQqq", "SQd", "sQq", "SSq"] {
        let err = verify(&packet, format).unwrap_err();
        assert!(
            matches!(err, ProtocolError::SchemaMismatch { .. }),
            "format {format}: {err}"
        );
    }
}

#[test]
fn test_fixture_reencodes_byte_for_byte() {
    let bytes = test_packet_bytes();
    let packet = decode_one(&bytes).unwrap();
    assert_eq!(encode(&packet).unwrap(), bytes);
}

#[test]
fn test_fixture_built_by_hand_encodes_identically() {
    let mut packet = Packet::new("TestPacket", 3).unwrap();
    packet
        .set(
            0,
            ArrayValue::strings(["Hello", "World", "Testing", "the", "library"]).unwrap(),
        )
        .unwrap();
    packet.set(1, ArrayValue::from(vec![0u64, 1, 2, 3, 4])).unwrap();
    packet.set(2, 0x0102_0304_0506_0708u64).unwrap();

    assert_eq!(encode(&packet).unwrap(), test_packet_bytes());
}

#[test]
fn test_fixture_every_prefix_is_truncation() {
    let bytes = test_packet_bytes();
    for len in 0..bytes.len() {
        let err = decode_one(&bytes[..len]).unwrap_err();
        assert!(err.is_truncation(), "prefix of {len} bytes: {err}");
    }
}

#[test]
fn test_fixture_through_stream_parser_in_odd_chunks() {
    let bytes = test_packet_bytes();
    let mut stream = bytes.clone();
    stream.extend_from_slice(&bytes);

    let mut parser = StreamParser::new();
    let mut packets = Vec::new();
    for chunk in stream.chunks(7) {
        packets.extend(parser.feed(chunk));
    }

    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0], packets[1]);
    verify(&packets[0], "SQq").unwrap();
    assert!(parser.is_idle());
}

#[test]
fn test_fixture_description() {
    let packet = decode_one(&test_packet_bytes()).unwrap();
    let text = packet.to_string();
    assert!(text.starts_with("{\n  \"header\" = \"TestPacket\",\n  \"data\" = [\n"));
    assert!(text.contains("      \"library\",\n    ] (7),\n"));
    assert!(text.contains("    72623859790382856 (3),\n"));
}
