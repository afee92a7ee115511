use scenebin::{Cursor, Endian, FormatError, RelocatingWriter};

#[test]
fn test_at_restores_position_after_failure() {
    let data = [0u8; 16];
    let mut cur = Cursor::new(&data, Endian::Little);
    cur.set_position(2);
    let err = cur.at(8, |c| c.assert_u32(&[7], "probe")).unwrap_err();
    assert!(matches!(err, FormatError::StructuralMismatch { position: 8, .. }));
    assert_eq!(cur.position(), 2);
}

#[test]
fn test_at_restores_position_after_success() {
    let data: Vec<u8> = (0u8..16).collect();
    let mut cur = Cursor::new(&data, Endian::Little);
    cur.set_position(1);
    let v = cur.at(4, |c| c.read_u8()).unwrap();
    assert_eq!(v, 4);
    assert_eq!(cur.position(), 1);
}

#[test]
fn test_step_nesting() {
    let data = [0u8; 32];
    let mut cur = Cursor::new(&data, Endian::Little);
    cur.set_position(4);
    cur.step_in(16).unwrap();
    assert_eq!(cur.position(), 16);
    cur.step_in(24).unwrap();
    assert_eq!(cur.position(), 24);
    cur.step_out().unwrap();
    assert_eq!(cur.position(), 16);
    cur.step_out().unwrap();
    assert_eq!(cur.position(), 4);
}

#[test]
fn test_step_out_without_step_in_is_fatal() {
    let data = [0u8; 4];
    let mut cur = Cursor::new(&data, Endian::Little);
    assert!(matches!(
        cur.step_out(),
        Err(FormatError::InternalConsistency(_))
    ));
}

#[test]
fn test_step_in_past_end_is_rejected() {
    let data = [0u8; 4];
    let mut cur = Cursor::new(&data, Endian::Little);
    assert!(matches!(
        cur.step_in(5),
        Err(FormatError::OffsetOutOfRange { value: 5, bound: 4, .. })
    ));
}

#[test]
fn test_peek_does_not_move() {
    let data = [1, 0, 0, 0, 2, 0, 0, 0];
    let cur = Cursor::new(&data, Endian::Little);
    assert_eq!(cur.peek_u32_at(4).unwrap(), 2);
    assert_eq!(cur.position(), 0);
}

#[test]
fn test_read_past_end_is_out_of_range() {
    let data = [0u8; 3];
    let mut cur = Cursor::new(&data, Endian::Little);
    assert!(matches!(
        cur.read_u32(),
        Err(FormatError::OffsetOutOfRange { .. })
    ));
}

#[test]
fn test_assert_accepts_any_listed_value() {
    let data = (-1i32).to_le_bytes();
    let mut cur = Cursor::new(&data, Endian::Little);
    assert_eq!(cur.assert_i32(&[0, -1], "sentinel").unwrap(), -1);
}

#[test]
fn test_big_endian_primitives() {
    let mut w = RelocatingWriter::new(Endian::Big);
    w.write_u32(0x1122_3344).unwrap();
    w.write_i64(-2).unwrap();
    let bytes = w.finish().unwrap();
    assert_eq!(bytes[0], 0x11);

    let mut cur = Cursor::new(&bytes, Endian::Big);
    assert_eq!(cur.read_u32().unwrap(), 0x1122_3344);
    assert_eq!(cur.read_i64().unwrap(), -2);
}

#[test]
fn test_utf16_roundtrip() {
    let mut w = RelocatingWriter::new(Endian::Little);
    w.write_utf16("Döor ↑").unwrap();
    let bytes = w.finish().unwrap();

    let mut cur = Cursor::new(&bytes, Endian::Little);
    assert_eq!(cur.read_utf16().unwrap(), "Döor ↑");
    assert_eq!(cur.remaining(), 0, "terminator must be consumed");
}

#[test]
fn test_utf16_missing_terminator_is_rejected() {
    // "AB" with no trailing null unit.
    let bytes = [0x41, 0x00, 0x42, 0x00];
    let mut cur = Cursor::new(&bytes, Endian::Little);
    assert!(matches!(
        cur.read_utf16(),
        Err(FormatError::OffsetOutOfRange { .. })
    ));
}

#[test]
fn test_align_advances_to_boundary() {
    let data = [0u8; 16];
    let mut cur = Cursor::new(&data, Endian::Little);
    cur.set_position(5);
    cur.align(8);
    assert_eq!(cur.position(), 8);
    cur.align(8);
    assert_eq!(cur.position(), 8);
}

#[test]
fn test_writer_finish_reports_unfilled_slot() {
    let mut w = RelocatingWriter::new(Endian::Little);
    w.reserve_u64("c0.next").unwrap();
    match w.finish() {
        Err(FormatError::InternalConsistency(msg)) => assert!(msg.contains("c0.next")),
        other => panic!("expected InternalConsistency, got {other:?}"),
    }
}

#[test]
fn test_patches_follow_writer_endianness() {
    let mut w = RelocatingWriter::new(Endian::Big);
    w.reserve_u32("slot").unwrap();
    w.fill_u32("slot", 0x0102_0304).unwrap();
    let bytes = w.finish().unwrap();
    assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04]);
}
