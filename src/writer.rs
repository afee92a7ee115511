//! Write-side counterpart of the cursor: a relocating writer.
//!
//! Offset-tree formats store offsets whose values are unknown until later
//! content has been emitted.  [`RelocatingWriter::reserve_u64`] writes a
//! zero placeholder at the current position and records it under a slot
//! name; `fill_u64` later appends a patch for that slot.  Patches are kept
//! in an explicit, append-only relocation table and applied in one
//! deterministic pass by [`RelocatingWriter::finish`], which refuses to
//! produce bytes while any reservation is unfilled — a missing offset is a
//! hard error, never a silently-wrong byte.
//!
//! Slot names must be unique within their *live* scope: a name may be
//! reused once its previous reservation has been filled.  Filling a slot
//! twice, or filling a name that was never reserved, is an
//! internal-consistency error.

use std::collections::HashMap;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use crate::cursor::Endian;
use crate::error::{FormatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotWidth {
    W32,
    W64,
}

#[derive(Debug)]
struct Reservation {
    pos:    usize,
    width:  SlotWidth,
    filled: bool,
}

#[derive(Debug)]
struct Patch {
    pos:   usize,
    width: SlotWidth,
    value: u64,
}

pub struct RelocatingWriter {
    buf:          Vec<u8>,
    endian:       Endian,
    reservations: HashMap<String, Reservation>,
    patches:      Vec<Patch>,
}

impl RelocatingWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf:          Vec::new(),
            endian,
            reservations: HashMap::new(),
            patches:      Vec::new(),
        }
    }

    pub fn position(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn endian(&self) -> Endian { self.endian }

    pub fn set_endian(&mut self, endian: Endian) { self.endian = endian; }

    // ── Primitive writes ─────────────────────────────────────────────────────

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.buf.write_u8(v)?;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        match self.endian {
            Endian::Little => self.buf.write_u16::<LittleEndian>(v)?,
            Endian::Big    => self.buf.write_u16::<BigEndian>(v)?,
        }
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        match self.endian {
            Endian::Little => self.buf.write_u32::<LittleEndian>(v)?,
            Endian::Big    => self.buf.write_u32::<BigEndian>(v)?,
        }
        Ok(())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_u32(v as u32)
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        match self.endian {
            Endian::Little => self.buf.write_u64::<LittleEndian>(v)?,
            Endian::Big    => self.buf.write_u64::<BigEndian>(v)?,
        }
        Ok(())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_u64(v as u64)
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_u32(v.to_bits())
    }

    pub fn write_vec3(&mut self, v: [f32; 3]) -> Result<()> {
        for c in v {
            self.write_f32(c)?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, b: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(b);
        Ok(())
    }

    /// Fixed-length ASCII field, NUL-padded to `len`.
    pub fn write_ascii(&mut self, s: &str, len: usize) -> Result<()> {
        if !s.is_ascii() || s.len() > len {
            return Err(FormatError::InternalConsistency(format!(
                "ASCII field {s:?} does not fit in {len} bytes"
            )));
        }
        self.buf.extend_from_slice(s.as_bytes());
        for _ in s.len()..len {
            self.buf.push(0);
        }
        Ok(())
    }

    /// Null-terminated UTF-16 string in the writer's byte order.
    pub fn write_utf16(&mut self, s: &str) -> Result<()> {
        for unit in s.encode_utf16() {
            self.write_u16(unit)?;
        }
        self.write_u16(0)
    }

    /// Write zero filler bytes until `position % alignment == 0`.
    pub fn pad(&mut self, alignment: u64) {
        while self.buf.len() as u64 % alignment != 0 {
            self.buf.push(0);
        }
    }

    // ── Reservation / relocation table ───────────────────────────────────────

    fn reserve(&mut self, name: &str, width: SlotWidth) -> Result<()> {
        if let Some(r) = self.reservations.get(name) {
            if !r.filled {
                return Err(FormatError::InternalConsistency(format!(
                    "slot {name:?} reserved again at 0x{:x} while still unfilled (previous at 0x{:x})",
                    self.buf.len(),
                    r.pos
                )));
            }
        }
        let pos = self.buf.len();
        match width {
            SlotWidth::W32 => self.buf.extend_from_slice(&[0u8; 4]),
            SlotWidth::W64 => self.buf.extend_from_slice(&[0u8; 8]),
        }
        self.reservations.insert(name.to_owned(), Reservation { pos, width, filled: false });
        Ok(())
    }

    fn fill(&mut self, name: &str, width: SlotWidth, value: u64) -> Result<()> {
        let r = self.reservations.get_mut(name).ok_or_else(|| {
            FormatError::InternalConsistency(format!("fill of never-reserved slot {name:?}"))
        })?;
        if r.filled {
            return Err(FormatError::InternalConsistency(format!(
                "slot {name:?} filled twice"
            )));
        }
        if r.width != width {
            return Err(FormatError::InternalConsistency(format!(
                "slot {name:?} filled with the wrong width"
            )));
        }
        r.filled = true;
        self.patches.push(Patch { pos: r.pos, width, value });
        Ok(())
    }

    /// Write a 4-byte zero placeholder and remember its position under `name`.
    pub fn reserve_u32(&mut self, name: &str) -> Result<()> {
        self.reserve(name, SlotWidth::W32)
    }

    /// Write an 8-byte zero placeholder and remember its position under `name`.
    pub fn reserve_u64(&mut self, name: &str) -> Result<()> {
        self.reserve(name, SlotWidth::W64)
    }

    pub fn fill_u32(&mut self, name: &str, value: u32) -> Result<()> {
        self.fill(name, SlotWidth::W32, value as u64)
    }

    pub fn fill_u64(&mut self, name: &str, value: u64) -> Result<()> {
        self.fill(name, SlotWidth::W64, value)
    }

    /// Fill `name` with the current position.
    pub fn fill_here_u64(&mut self, name: &str) -> Result<()> {
        let pos = self.position();
        self.fill_u64(name, pos)
    }

    /// Verify every reservation was filled, apply the relocation table in one
    /// pass, and return the finished bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let mut unfilled: Vec<(&String, usize)> = self
            .reservations
            .iter()
            .filter(|(_, r)| !r.filled)
            .map(|(n, r)| (n, r.pos))
            .collect();
        if !unfilled.is_empty() {
            unfilled.sort_by_key(|&(_, pos)| pos);
            let (name, pos) = unfilled[0];
            return Err(FormatError::InternalConsistency(format!(
                "slot {name:?} reserved at 0x{pos:x} was never filled ({} unfilled total)",
                unfilled.len()
            )));
        }
        for p in &self.patches {
            match p.width {
                SlotWidth::W32 => {
                    let raw = match self.endian {
                        Endian::Little => (p.value as u32).to_le_bytes(),
                        Endian::Big    => (p.value as u32).to_be_bytes(),
                    };
                    self.buf[p.pos..p.pos + 4].copy_from_slice(&raw);
                }
                SlotWidth::W64 => {
                    let raw = match self.endian {
                        Endian::Little => p.value.to_le_bytes(),
                        Endian::Big    => p.value.to_be_bytes(),
                    };
                    self.buf[p.pos..p.pos + 8].copy_from_slice(&raw);
                }
            }
        }
        Ok(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_fill_patches_in_place() {
        let mut w = RelocatingWriter::new(Endian::Little);
        w.write_u32(0xAABBCCDD).unwrap();
        w.reserve_u64("target").unwrap();
        w.write_u16(7).unwrap();
        w.fill_here_u64("target").unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(u64::from_le_bytes(bytes[4..12].try_into().unwrap()), 14);
    }

    #[test]
    fn unfilled_slot_is_fatal() {
        let mut w = RelocatingWriter::new(Endian::Little);
        w.reserve_u32("orphan").unwrap();
        assert!(matches!(
            w.finish(),
            Err(FormatError::InternalConsistency(_))
        ));
    }

    #[test]
    fn double_fill_is_fatal() {
        let mut w = RelocatingWriter::new(Endian::Little);
        w.reserve_u32("slot").unwrap();
        w.fill_u32("slot", 1).unwrap();
        assert!(w.fill_u32("slot", 2).is_err());
    }

    #[test]
    fn slot_name_reusable_after_fill() {
        let mut w = RelocatingWriter::new(Endian::Little);
        w.reserve_u32("off").unwrap();
        w.fill_u32("off", 1).unwrap();
        w.reserve_u32("off").unwrap();
        w.fill_u32("off", 2).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
    }

    #[test]
    fn pad_aligns_position() {
        let mut w = RelocatingWriter::new(Endian::Little);
        w.write_u8(1).unwrap();
        w.pad(8);
        assert_eq!(w.position(), 8);
        w.pad(8);
        assert_eq!(w.position(), 8);
    }
}
