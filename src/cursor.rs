//! Position-tracking read cursor with scoped relocation.
//!
//! The container formats this crate decodes are offset trees: a record's
//! sub-blocks live at self-relative offsets, not contiguously after its
//! header.  [`Cursor::at`] is the navigation primitive for that shape — it
//! jumps to an absolute offset, runs a closure, and restores the previous
//! position even when the closure errors, so no error path can leak an
//! unbalanced jump.  The raw [`Cursor::step_in`]/[`Cursor::step_out`] pair
//! is exposed for callers that need to interleave scopes manually; every
//! `step_in` must be matched by exactly one `step_out`.
//!
//! Strict-assertion reads (`assert_u32` and friends) are how reserved and
//! unknown fields are handled: the value is validated against a sentinel
//! list on read and therefore safe to reproduce unchanged on write.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::{FormatError, Result};

/// Byte order of a container, selected by the file header's format flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

pub struct Cursor<'a> {
    data:   &'a [u8],
    pos:    u64,
    stack:  Vec<u64>,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, pos: 0, stack: Vec::new(), endian }
    }

    pub fn position(&self) -> u64 { self.pos }

    pub fn endian(&self) -> Endian { self.endian }

    /// Switch byte order mid-stream.  The file header is always little-endian;
    /// the containers that follow honor the header's endianness flag.
    pub fn set_endian(&mut self, endian: Endian) { self.endian = endian; }

    /// Absolute seek.  A position past the end of the buffer is legal here
    /// and only fails at the next read.
    pub fn set_position(&mut self, pos: u64) { self.pos = pos; }

    pub fn remaining(&self) -> u64 {
        (self.data.len() as u64).saturating_sub(self.pos)
    }

    // ── Scoped relocation ────────────────────────────────────────────────────

    /// Push the current position and jump to `offset`.
    pub fn step_in(&mut self, offset: u64) -> Result<()> {
        if offset > self.data.len() as u64 {
            return Err(FormatError::OffsetOutOfRange {
                value:   offset as i64,
                bound:   self.data.len() as u64,
                context: "step_in target",
            });
        }
        self.stack.push(self.pos);
        self.pos = offset;
        Ok(())
    }

    /// Pop the stack and restore the previous position.
    pub fn step_out(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(p) => { self.pos = p; Ok(()) }
            None => Err(FormatError::InternalConsistency(
                "step_out with an empty step stack".into(),
            )),
        }
    }

    /// Run `f` with the cursor relocated to `offset`, restoring the previous
    /// position afterwards — on error paths too.
    pub fn at<T, F>(&mut self, offset: u64, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.step_in(offset)?;
        let out = f(self);
        self.step_out()?;
        out
    }

    // ── Primitive reads ──────────────────────────────────────────────────────

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let start = self.pos as usize;
        let end = start.saturating_add(n);
        if end > self.data.len() {
            return Err(FormatError::OffsetOutOfRange {
                value:   end as i64,
                bound:   self.data.len() as u64,
                context: "read past end of buffer",
            });
        }
        self.pos = end as u64;
        Ok(&self.data[start..end])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let endian = self.endian;
        let mut b = self.take(2)?;
        Ok(match endian {
            Endian::Little => b.read_u16::<LittleEndian>()?,
            Endian::Big    => b.read_u16::<BigEndian>()?,
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let endian = self.endian;
        let mut b = self.take(4)?;
        Ok(match endian {
            Endian::Little => b.read_u32::<LittleEndian>()?,
            Endian::Big    => b.read_u32::<BigEndian>()?,
        })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let endian = self.endian;
        let mut b = self.take(8)?;
        Ok(match endian {
            Endian::Little => b.read_u64::<LittleEndian>()?,
            Endian::Big    => b.read_u64::<BigEndian>()?,
        })
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Fixed-size float vector.
    pub fn read_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Fixed-length ASCII string; trailing NULs are stripped.
    pub fn read_ascii(&mut self, len: usize) -> Result<String> {
        let position = self.pos;
        let raw = self.take(len)?;
        if !raw.is_ascii() {
            return Err(FormatError::StructuralMismatch {
                position,
                expected: "ASCII bytes".into(),
                found:    format!("{raw:?}"),
                context:  "fixed-length ASCII string",
            });
        }
        let trimmed = raw.iter().take_while(|&&b| b != 0).copied().collect();
        // from_utf8 on ASCII cannot fail; checked above.
        String::from_utf8(trimmed).map_err(|_| FormatError::StructuralMismatch {
            position,
            expected: "ASCII bytes".into(),
            found:    "non-UTF8".into(),
            context:  "fixed-length ASCII string",
        })
    }

    /// Null-terminated UTF-16 string in the cursor's byte order.
    pub fn read_utf16(&mut self) -> Result<String> {
        let position = self.pos;
        let mut units = Vec::new();
        loop {
            let u = self.read_u16()?;
            if u == 0 {
                break;
            }
            units.push(u);
        }
        String::from_utf16(&units).map_err(|_| FormatError::StructuralMismatch {
            position,
            expected: "well-formed UTF-16".into(),
            found:    "unpaired surrogate".into(),
            context:  "null-terminated UTF-16 string",
        })
    }

    /// Advance to the next multiple of `alignment` without validating the
    /// skipped bytes.
    pub fn align(&mut self, alignment: u64) {
        let rem = self.pos % alignment;
        if rem != 0 {
            self.pos += alignment - rem;
        }
    }

    // ── Strict-assertion reads ───────────────────────────────────────────────

    pub fn assert_u32(&mut self, expected: &[u32], context: &'static str) -> Result<u32> {
        let position = self.pos;
        let v = self.read_u32()?;
        if expected.contains(&v) {
            Ok(v)
        } else {
            Err(mismatch(position, expected, v as i64, context))
        }
    }

    pub fn assert_i32(&mut self, expected: &[i32], context: &'static str) -> Result<i32> {
        let position = self.pos;
        let v = self.read_i32()?;
        if expected.contains(&v) {
            Ok(v)
        } else {
            Err(mismatch(position, expected, v as i64, context))
        }
    }

    pub fn assert_u64(&mut self, expected: &[u64], context: &'static str) -> Result<u64> {
        let position = self.pos;
        let v = self.read_u64()?;
        if expected.contains(&v) {
            Ok(v)
        } else {
            Err(mismatch(position, expected, v as i64, context))
        }
    }

    // ── Peek reads (no position movement) ────────────────────────────────────

    /// Read a 32-bit value at an absolute offset without moving the cursor.
    /// Used for discriminator lookahead before variant dispatch.
    pub fn peek_u32_at(&self, offset: u64) -> Result<u32> {
        let start = offset as usize;
        let end = start.saturating_add(4);
        if end > self.data.len() {
            return Err(FormatError::OffsetOutOfRange {
                value:   offset as i64,
                bound:   self.data.len() as u64,
                context: "peek past end of buffer",
            });
        }
        let raw: [u8; 4] = self.data[start..end].try_into().unwrap_or([0; 4]);
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big    => u32::from_be_bytes(raw),
        })
    }

    /// Read a null-terminated UTF-16 string at an absolute offset without
    /// moving the cursor.
    pub fn peek_utf16_at(&self, offset: u64) -> Result<String> {
        let mut probe = Cursor::new(self.data, self.endian);
        probe.set_position(offset);
        probe.read_utf16()
    }
}

fn mismatch<T: std::fmt::Debug>(
    position: u64,
    expected: &[T],
    found:    i64,
    context:  &'static str,
) -> FormatError {
    FormatError::StructuralMismatch {
        position,
        expected: format!("one of {expected:?}"),
        found:    format!("{found} (0x{found:x})"),
        context,
    }
}
