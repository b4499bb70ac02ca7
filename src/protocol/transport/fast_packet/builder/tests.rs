//! Tests for Fast Packet frame encoding and sequence counters.
use super::*;

#[test]
/// Ten-byte payload split across two Fast Packet frames.
fn test_encode_two_frames() {
    let payload = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

    let (frame0, used0) = encode_frame(0, 0, &payload, 0);
    assert_eq!(used0, 6);
    assert_eq!(frame0, [0x00, 10, 1, 2, 3, 4, 5, 6]);

    let (frame1, used1) = encode_frame(0, 1, &payload, used0);
    assert_eq!(used1, 4);
    assert_eq!(frame1, [0x01, 7, 8, 9, 10, 0xFF, 0xFF, 0xFF]);
}

#[test]
/// The sequence occupies the upper three bits and the frame index the lower five.
fn test_encode_header_bits() {
    let payload = [0u8; 40];
    let (frame, used) = encode_frame(5, 3, &payload, 6 + 2 * 7);
    assert_eq!(frame[0], (5 << 5) | 3);
    assert_eq!(used, 7);

    // sequence wider than three bits is masked
    let (frame, _) = encode_frame(0x0D, 0, &payload, 0);
    assert_eq!(frame[0], 0xA0);
}

#[test]
/// Short payloads still use Fast Packet framing and pad the tail.
fn test_encode_short_payload() {
    let (frame, used) = encode_frame(2, 0, &[0xAB, 0xCD], 0);
    assert_eq!(used, 2);
    assert_eq!(frame, [0x40, 2, 0xAB, 0xCD, 0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
/// Maximum payload needs 32 frames with the last one carrying the tail.
fn test_encode_max_payload() {
    let payload = [0x42; 223];
    let mut position = 0;
    let mut index = 0u8;
    while position < payload.len() {
        let (_, used) = encode_frame(1, index, &payload, position);
        position += used;
        index += 1;
    }
    assert_eq!(index, 32);
    assert_eq!(crate::protocol::transport::fast_packet::frame_count(223), 32);
}

#[test]
/// Each PGN cycles its own counter through eight values.
fn test_sequence_per_pgn() {
    let mut table = SequenceTable::new();
    assert_eq!(table.next(130816), 0);
    assert_eq!(table.next(130816), 1);
    assert_eq!(table.next(126720), 0);
    for _ in 0..6 {
        table.next(130816);
    }
    assert_eq!(table.next(130816), 0);
    assert_eq!(table.next(126720), 1);
}

#[test]
/// Once every slot is taken, new PGNs share the overflow counter.
fn test_sequence_overflow() {
    let mut table = SequenceTable::new();
    for pgn in 0..SEQUENCE_SLOTS as u32 {
        assert_eq!(table.next(0x1FE00 + pgn), 0);
    }
    assert_eq!(table.next(1), 0);
    assert_eq!(table.next(2), 1);
    assert_eq!(table.next(0x1FE00), 1);
}
