//! Polymorphic record framing.
//!
//! A record is an offset tree anchored at its own start position: the header
//! holds self-relative offsets to the name string, one or two fixed
//! base-data blocks, an optional shape sub-record, and the type-specific
//! block.  The concrete layout is chosen by peeking the discriminator at its
//! fixed header offset *before* moving the cursor, so an unknown
//! discriminator fails without consuming a single byte.
//!
//! The write side mirrors the read side exactly: every offset the reader
//! consumed is reserved up front and back-filled once its block has been
//! emitted, and absent optional blocks fill their slot with the literal 0.

use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::{FormatError, Result};
use crate::registry::{FormatVersion, ShapeRule, TypeDataRule, VariantRegistry};
use crate::writer::RelocatingWriter;

/// Byte offset of the discriminator within a record header (after the 8-byte
/// name offset).  Constant across all variants of a family, which is what
/// makes lookahead dispatch possible.
pub const DISCRIMINATOR_OFFSET: u64 = 8;

// ── Model ────────────────────────────────────────────────────────────────────

/// Fixed base-data block shared by every variant of a family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseData {
    pub position:  [f32; 3],
    pub rotation:  [f32; 3],
    pub scale:     [f32; 3],
    pub entity_id: i32,
}

impl Default for BaseData {
    fn default() -> Self {
        Self {
            position:  [0.0; 3],
            rotation:  [0.0; 3],
            scale:     [1.0; 3],
            entity_id: -1,
        }
    }
}

/// Secondary base block carried by variants with render-group data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrawGroups {
    pub draw:    u32,
    pub display: u32,
}

/// One polymorphic entry in a container.
///
/// `type_data_present` records whether a [`TypeDataRule::Flagged`] block was
/// present at read time, so the write side replays the same presence instead
/// of re-deriving it from the payload's field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record<P> {
    pub name:              String,
    pub id:                i32,
    pub base:              BaseData,
    pub groups:            Option<DrawGroups>,
    pub shape:             Option<Shape>,
    pub type_data_present: bool,
    pub payload:           P,
}

// ── Shapes ───────────────────────────────────────────────────────────────────

/// Nested polymorphic shape sub-record, dispatched with the same
/// discriminator-peek technique as records, against its own small closed
/// enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Shape {
    Point,
    Circle { radius: f32 },
    Sphere { radius: f32 },
    Box { width: f32, depth: f32, height: f32 },
    Cylinder { radius: f32, height: f32 },
}

impl Shape {
    pub fn discriminator(&self) -> u32 {
        match self {
            Shape::Point           => 0,
            Shape::Circle { .. }   => 1,
            Shape::Sphere { .. }   => 2,
            Shape::Box { .. }      => 3,
            Shape::Cylinder { .. } => 4,
        }
    }

    pub fn read(cur: &mut Cursor) -> Result<Self> {
        let position = cur.position();
        let disc = cur.peek_u32_at(position)?;
        let shape = match disc {
            0 => { cur.read_u32()?; Shape::Point }
            1 => { cur.read_u32()?; Shape::Circle { radius: cur.read_f32()? } }
            2 => { cur.read_u32()?; Shape::Sphere { radius: cur.read_f32()? } }
            3 => {
                cur.read_u32()?;
                Shape::Box {
                    width:  cur.read_f32()?,
                    depth:  cur.read_f32()?,
                    height: cur.read_f32()?,
                }
            }
            4 => {
                cur.read_u32()?;
                Shape::Cylinder { radius: cur.read_f32()?, height: cur.read_f32()? }
            }
            _ => {
                return Err(FormatError::UnsupportedVariant {
                    position,
                    discriminator: disc,
                    family: "shape",
                })
            }
        };
        Ok(shape)
    }

    pub fn write(&self, w: &mut RelocatingWriter) -> Result<()> {
        w.write_u32(self.discriminator())?;
        match *self {
            Shape::Point => {}
            Shape::Circle { radius } | Shape::Sphere { radius } => w.write_f32(radius)?,
            Shape::Box { width, depth, height } => {
                w.write_f32(width)?;
                w.write_f32(depth)?;
                w.write_f32(height)?;
            }
            Shape::Cylinder { radius, height } => {
                w.write_f32(radius)?;
                w.write_f32(height)?;
            }
        }
        Ok(())
    }
}

// ── Read ─────────────────────────────────────────────────────────────────────

/// Convert a self-relative block offset to an absolute position, rejecting
/// zero and negative values with the record's declared type in the message.
fn require_offset(off: i64, anchor: u64, variant: &str, what: &str) -> Result<u64> {
    if off > 0 {
        Ok(anchor + off as u64)
    } else {
        Err(FormatError::StructuralMismatch {
            position: anchor,
            expected: format!("non-zero {what} offset in {variant} record"),
            found:    off.to_string(),
            context:  "record header",
        })
    }
}

/// Read one record at the cursor's position.
///
/// On an unknown discriminator the cursor has not moved: the lookahead is a
/// peek, so dispatch consumes zero bytes before failing.
pub fn read_record<R: VariantRegistry>(cur: &mut Cursor, reg: &R) -> Result<Record<R::Payload>> {
    let start = cur.position();
    let disc = cur.peek_u32_at(start + DISCRIMINATOR_OFFSET)?;
    let layout = reg.layout(disc).ok_or(FormatError::UnsupportedVariant {
        position:      start,
        discriminator: disc,
        family:        "record",
    })?;

    let name_offset = cur.read_i64()?;
    cur.assert_u32(&[disc], "record discriminator")?;
    let id = cur.read_i32()?;
    cur.assert_i32(&[0], "record header reserved field")?;
    let base_offset = cur.read_i64()?;
    let groups_offset = if layout.extra_base_block { Some(cur.read_i64()?) } else { None };
    let shape_offset = if layout.shape != ShapeRule::Never { Some(cur.read_i64()?) } else { None };
    let type_offset = cur.read_i64()?;

    let name_abs = require_offset(name_offset, start, layout.name, "name block")?;
    let name = cur.at(name_abs, |c| c.read_utf16())?;

    let base_abs = require_offset(base_offset, start, layout.name, "base data")?;
    let base = cur.at(base_abs, |c| {
        let position = c.read_vec3()?;
        let rotation = c.read_vec3()?;
        let scale = c.read_vec3()?;
        let entity_id = c.read_i32()?;
        c.assert_i32(&[0], "base block reserved field")?;
        Ok(BaseData { position, rotation, scale, entity_id })
    })?;

    let groups = match groups_offset {
        Some(off) => {
            let abs = require_offset(off, start, layout.name, "draw-group data")?;
            Some(cur.at(abs, |c| {
                let draw = c.read_u32()?;
                let display = c.read_u32()?;
                c.assert_u64(&[0], "draw-group reserved field")?;
                Ok(DrawGroups { draw, display })
            })?)
        }
        None => None,
    };

    let shape = match (layout.shape, shape_offset) {
        (ShapeRule::Never, _) => None,
        (ShapeRule::Optional, Some(0)) => None,
        (ShapeRule::Optional, Some(off)) | (ShapeRule::Always, Some(off)) => {
            let abs = require_offset(off, start, layout.name, "shape data")?;
            Some(cur.at(abs, Shape::read)?)
        }
        // Shape offset presence in the header follows the rule; these arms
        // are unreachable by construction.
        (_, None) => None,
    };

    let (payload, type_data_present) = match layout.type_data {
        TypeDataRule::Never | TypeDataRule::AlwaysZeroOffset => {
            if type_offset != 0 {
                return Err(FormatError::StructuralMismatch {
                    position: start,
                    expected: format!("zero type-data offset in {} record", layout.name),
                    found:    type_offset.to_string(),
                    context:  "record header",
                });
            }
            // The rule still mandates executing the read, against a
            // synthetic zero-length view.
            let mut empty = Cursor::new(&[], cur.endian());
            (reg.read_payload(disc, &mut empty)?, false)
        }
        TypeDataRule::Flagged => {
            if type_offset == 0 {
                let mut empty = Cursor::new(&[], cur.endian());
                (reg.read_payload(disc, &mut empty)?, false)
            } else {
                let abs = require_offset(type_offset, start, layout.name, "type data")?;
                (cur.at(abs, |c| reg.read_payload(disc, c))?, true)
            }
        }
        TypeDataRule::Always => {
            let abs = require_offset(type_offset, start, layout.name, "type data")?;
            (cur.at(abs, |c| reg.read_payload(disc, c))?, true)
        }
    };

    Ok(Record { name, id, base, groups, shape, type_data_present, payload })
}

// ── Write ────────────────────────────────────────────────────────────────────

/// Serialize one record at the writer's position.  `slot_prefix` namespaces
/// this record's offset slots so reservations can never alias across
/// records or containers.
pub fn write_record<R: VariantRegistry>(
    w: &mut RelocatingWriter,
    rec: &Record<R::Payload>,
    reg: &R,
    ver: &FormatVersion,
    slot_prefix: &str,
) -> Result<()> {
    let start = w.position();
    let disc = reg.discriminator_of(&rec.payload);
    let layout = reg.layout(disc).ok_or(FormatError::UnsupportedVariant {
        position:      start,
        discriminator: disc,
        family:        "record",
    })?;

    let name_slot = format!("{slot_prefix}.name");
    let base_slot = format!("{slot_prefix}.base");
    let groups_slot = format!("{slot_prefix}.groups");
    let shape_slot = format!("{slot_prefix}.shape");
    let type_slot = format!("{slot_prefix}.type");

    w.reserve_u64(&name_slot)?;
    w.write_u32(disc)?;
    w.write_i32(rec.id)?;
    w.write_i32(0)?;
    w.reserve_u64(&base_slot)?;
    if layout.extra_base_block {
        w.reserve_u64(&groups_slot)?;
    }
    if layout.shape != ShapeRule::Never {
        w.reserve_u64(&shape_slot)?;
    }
    w.reserve_u64(&type_slot)?;

    let rel = w.position() - start;
    w.fill_u64(&name_slot, rel)?;
    w.write_utf16(&rec.name)?;
    w.pad(ver.name_align);

    let rel = w.position() - start;
    w.fill_u64(&base_slot, rel)?;
    w.write_vec3(rec.base.position)?;
    w.write_vec3(rec.base.rotation)?;
    w.write_vec3(rec.base.scale)?;
    w.write_i32(rec.base.entity_id)?;
    w.write_i32(0)?;

    if layout.extra_base_block {
        let groups = rec.groups.ok_or_else(|| {
            FormatError::InternalConsistency(format!(
                "{} record {:?} is missing its draw-group block",
                layout.name, rec.name
            ))
        })?;
        let rel = w.position() - start;
        w.fill_u64(&groups_slot, rel)?;
        w.write_u32(groups.draw)?;
        w.write_u32(groups.display)?;
        w.write_u64(0)?;
    } else if rec.groups.is_some() {
        return Err(FormatError::InternalConsistency(format!(
            "{} record {:?} carries a draw-group block its variant does not declare",
            layout.name, rec.name
        )));
    }

    match (layout.shape, &rec.shape) {
        (ShapeRule::Never, None) => {}
        (ShapeRule::Never, Some(_)) => {
            return Err(FormatError::InternalConsistency(format!(
                "{} record {:?} carries a shape its variant does not declare",
                layout.name, rec.name
            )));
        }
        (ShapeRule::Optional, None) => w.fill_u64(&shape_slot, 0)?,
        (ShapeRule::Always, None) => {
            return Err(FormatError::InternalConsistency(format!(
                "{} record {:?} is missing its mandatory shape",
                layout.name, rec.name
            )));
        }
        (ShapeRule::Optional, Some(shape)) | (ShapeRule::Always, Some(shape)) => {
            let rel = w.position() - start;
            w.fill_u64(&shape_slot, rel)?;
            shape.write(w)?;
        }
    }

    match layout.type_data {
        TypeDataRule::Never | TypeDataRule::AlwaysZeroOffset => w.fill_u64(&type_slot, 0)?,
        TypeDataRule::Always => {
            let rel = w.position() - start;
            w.fill_u64(&type_slot, rel)?;
            reg.write_payload(&rec.payload, w)?;
        }
        TypeDataRule::Flagged => {
            if rec.type_data_present {
                let rel = w.position() - start;
                w.fill_u64(&type_slot, rel)?;
                reg.write_payload(&rec.payload, w)?;
            } else {
                w.fill_u64(&type_slot, 0)?;
            }
        }
    }

    Ok(())
}
