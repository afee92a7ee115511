//! Container framing: a named, typed list of records.
//!
//! On disk a container is a leading version/flags integer, an offset count,
//! a type-name offset, one absolute offset per record, and a trailing
//! next-container offset that chains containers sequentially through the
//! file (0 ends the chain).  The offset count is declared as
//! `record count + 1`: the extra slot is reserved for the container's own
//! type-name offset, an off-by-one inherited from the original producers
//! that every version of the format shares.
//!
//! Filling the next-container slot is a cross-container concern owned by the
//! caller, not by a single container write — see [`crate::scene`].

use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::{FormatError, Result};
use crate::record::{read_record, write_record, Record};
use crate::registry::{FormatVersion, VariantRegistry};
use crate::writer::RelocatingWriter;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Container<P> {
    /// Container type name, verified against the caller's expectation on read.
    pub name: String,
    /// Opaque leading version/flags integer, preserved verbatim.
    pub leading: i32,
    pub records: Vec<Record<P>>,
}

impl<P> Container<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), leading: 0, records: Vec::new() }
    }
}

/// Read one container at the cursor's position.
///
/// Verifies the stored type name against `expected_name`, reads every record
/// through its offset-table entry, and returns the container together with
/// the next-container target (0 = end of chain).  When the chain continues,
/// the cursor is left at that target.
pub fn read_container<R: VariantRegistry>(
    cur: &mut Cursor,
    reg: &R,
    ver: &FormatVersion,
    expected_name: &str,
) -> Result<(Container<R::Payload>, u64)> {
    let anchor = cur.position();
    let leading = cur.read_i32()?;

    let count_plus_one = cur.read_i32()?;
    if count_plus_one < 1 {
        return Err(FormatError::StructuralMismatch {
            position: anchor + 4,
            expected: "offset count >= 1 (record count + type-name slot)".into(),
            found:    count_plus_one.to_string(),
            context:  "container offset count",
        });
    }
    let count = (count_plus_one - 1) as usize;
    // The offset table (type name + records + next) must fit in the
    // remaining bytes; check before sizing any allocation off the count.
    let table_bytes = (count as u64 + 2) * 8;
    if table_bytes > cur.remaining() {
        return Err(FormatError::OffsetOutOfRange {
            value:   count_plus_one as i64,
            bound:   cur.remaining() / 8,
            context: "container offset count",
        });
    }

    let name_offset = cur.read_u64()?;
    let name_abs = if ver.type_name_offset_anchored {
        anchor.checked_add(name_offset).ok_or(FormatError::OffsetOutOfRange {
            value:   name_offset as i64,
            bound:   u64::MAX - anchor,
            context: "container type-name offset",
        })?
    } else {
        name_offset
    };

    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(cur.read_u64()?);
    }
    let next = cur.read_i64()?;
    if next < 0 {
        return Err(FormatError::OffsetOutOfRange {
            value:   next,
            bound:   0,
            context: "next-container offset",
        });
    }

    let name = cur.peek_utf16_at(name_abs)?;
    if name != expected_name {
        return Err(FormatError::StructuralMismatch {
            position: name_abs,
            expected: format!("container type name {expected_name:?}"),
            found:    format!("{name:?}"),
            context:  "container type name",
        });
    }

    // Legacy producers emitted a zero-length placeholder block (8 zero
    // bytes) after the padded type name; validate it so the bytes are safe
    // to reproduce on write.
    if ver.legacy_placeholders {
        cur.at(name_abs, |c| {
            c.read_utf16()?;
            c.align(ver.name_align);
            c.assert_u64(&[0], "legacy container placeholder block")?;
            Ok(())
        })?;
    }

    let mut records = Vec::with_capacity(count);
    for off in offsets {
        records.push(cur.at(off, |c| read_record(c, reg))?);
    }

    if next != 0 {
        cur.set_position(next as u64);
    }
    Ok((Container { name, leading, records }, next as u64))
}

/// Write one container at the writer's position.
///
/// Every record offset and the type-name offset are reserved up front and
/// back-filled as their targets are emitted.  The next-container slot
/// (`"{slot_prefix}.next"`) is reserved here but deliberately left for the
/// caller to fill once the following container has been placed.
pub fn write_container<R: VariantRegistry>(
    w: &mut RelocatingWriter,
    container: &Container<R::Payload>,
    reg: &R,
    ver: &FormatVersion,
    slot_prefix: &str,
) -> Result<()> {
    let anchor = w.position();
    w.write_i32(container.leading)?;
    w.write_i32(container.records.len() as i32 + 1)?;

    let name_slot = format!("{slot_prefix}.typename");
    w.reserve_u64(&name_slot)?;
    for i in 0..container.records.len() {
        w.reserve_u64(&format!("{slot_prefix}.rec{i}"))?;
    }
    w.reserve_u64(&format!("{slot_prefix}.next"))?;

    let name_pos = w.position();
    let name_value = if ver.type_name_offset_anchored { name_pos - anchor } else { name_pos };
    w.fill_u64(&name_slot, name_value)?;
    w.write_utf16(&container.name)?;
    w.pad(ver.name_align);
    if ver.legacy_placeholders {
        w.write_u64(0)?;
    }

    for (i, rec) in container.records.iter().enumerate() {
        let rec_slot = format!("{slot_prefix}.rec{i}");
        w.fill_here_u64(&rec_slot)?;
        write_record(w, rec, reg, ver, &rec_slot)?;
    }
    Ok(())
}
