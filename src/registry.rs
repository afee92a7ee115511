//! Variant registry: the dispatch boundary between the generic codec and the
//! catalogue of concrete record schemas.
//!
//! The registry supplies, per format version, the mapping from discriminator
//! value to variant layout, and reads/writes each variant's type-specific
//! field block.  Dispatch is closed: a discriminator with no layout entry is
//! an unsupported-variant error, never a skip, because record length is
//! variant-dependent and cannot be inferred without the schema.
//!
//! Per-version layout inconsistencies observed in the wild (anchor-relative
//! vs absolute type-name offsets, zero-length placeholder blocks emitted by
//! legacy producers, type-data offsets written as zero for blocks that are
//! nonetheless "read") are encoded as explicit [`FormatVersion`] and
//! [`TypeDataRule`] configuration, never inferred from the data.  A new
//! format version gets a new profile here, validated against real sample
//! files first.

use crate::cursor::{Cursor, Endian};
use crate::error::{FormatError, Result};
use crate::writer::RelocatingWriter;

// ── Presence rules ───────────────────────────────────────────────────────────

/// When a variant's type-specific block is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDataRule {
    /// The variant never has a type block; its offset slot is written as 0.
    Never,
    /// Sometimes present.  The record object carries the presence flag so the
    /// write side replays exactly what the read side saw instead of
    /// re-deriving it from field values.
    Flagged,
    /// Always present; an offset of 0 is a structural error.
    Always,
    /// Legacy quirk: the offset is always written as 0, yet the reader still
    /// executes the type-data read against a synthetic zero-length view.
    /// Preserved verbatim for byte-exact compatibility.
    AlwaysZeroOffset,
}

/// When a variant carries an embedded shape sub-record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeRule {
    Never,
    /// Shape offset 0 encodes "no shape".
    Optional,
    /// Shape offset 0 is a structural error.
    Always,
}

/// Framing description of one record variant.
#[derive(Debug, Clone, Copy)]
pub struct VariantLayout {
    /// Declared type name, used only in diagnostics.
    pub name:             &'static str,
    pub type_data:        TypeDataRule,
    pub shape:            ShapeRule,
    /// Whether the header carries a second base-data offset (draw groups).
    pub extra_base_block: bool,
}

// ── Format version profiles ──────────────────────────────────────────────────

/// Per-version layout configuration.  Every field is explicit; nothing is
/// inferred from the bytes.
#[derive(Debug, Clone, Copy)]
pub struct FormatVersion {
    pub version: u32,
    pub endian:  Endian,
    /// Container type-name offsets are relative to the container header start
    /// instead of absolute file positions.
    pub type_name_offset_anchored: bool,
    /// Alignment of name-string blocks, 4 or 8 bytes.
    pub name_align: u64,
    /// Legacy producers emitted an 8-byte zero placeholder block after each
    /// container's padded type name; it is validated on read and re-emitted
    /// on write.
    pub legacy_placeholders: bool,
}

impl FormatVersion {
    pub const V1_LEGACY: FormatVersion = FormatVersion {
        version: 1,
        endian:  Endian::Little,
        type_name_offset_anchored: true,
        name_align: 4,
        legacy_placeholders: true,
    };

    pub const V2: FormatVersion = FormatVersion {
        version: 2,
        endian:  Endian::Little,
        type_name_offset_anchored: false,
        name_align: 8,
        legacy_placeholders: false,
    };

    /// Resolve the file header's version integer and flag bytes to a profile.
    ///
    /// Flag byte 0 selects the container byte order (0 = little, 1 = big);
    /// the remaining flag bytes are reserved and must be zero.
    pub fn from_header(version: u32, flags: [u8; 4]) -> Result<Self> {
        let mut profile = match version {
            1 => Self::V1_LEGACY,
            2 => Self::V2,
            v => {
                return Err(FormatError::StructuralMismatch {
                    position: 4,
                    expected: "one of [1, 2]".into(),
                    found:    v.to_string(),
                    context:  "format version",
                })
            }
        };
        profile.endian = match flags[0] {
            0 => Endian::Little,
            1 => Endian::Big,
            b => {
                return Err(FormatError::StructuralMismatch {
                    position: 12,
                    expected: "one of [0, 1]".into(),
                    found:    b.to_string(),
                    context:  "endianness flag",
                })
            }
        };
        if flags[1..] != [0, 0, 0] {
            return Err(FormatError::StructuralMismatch {
                position: 13,
                expected: "[0, 0, 0]".into(),
                found:    format!("{:?}", &flags[1..]),
                context:  "reserved format flags",
            });
        }
        Ok(profile)
    }
}

// ── Registry contract ────────────────────────────────────────────────────────

/// Closed dispatch surface for one record family.
///
/// `Payload` is the family's tagged union of type-specific field blocks.
/// `read_payload` may be invoked against a zero-length cursor when the
/// variant's rule mandates a read with no bytes present
/// ([`TypeDataRule::AlwaysZeroOffset`], or a flagged block that is absent);
/// implementations yield the variant's default field set in that case.
pub trait VariantRegistry {
    type Payload: Clone;

    /// Layout for a discriminator, or `None` for unknown values.
    fn layout(&self, discriminator: u32) -> Option<VariantLayout>;

    /// Read the type-specific field block of `discriminator`.
    fn read_payload(&self, discriminator: u32, cur: &mut Cursor) -> Result<Self::Payload>;

    /// Write the type-specific field block.
    fn write_payload(&self, payload: &Self::Payload, w: &mut RelocatingWriter) -> Result<()>;

    fn discriminator_of(&self, payload: &Self::Payload) -> u32;

    /// Position of this record's sub-kind in the fixed concatenation order
    /// used to compute and interpret reference indices.
    fn concat_rank(&self, payload: &Self::Payload) -> usize;

    /// Type names of the containers chained through a file, in file order.
    fn container_order(&self) -> &'static [&'static str];

    /// Subset of `container_order` whose records participate in reference
    /// indexing and name disambiguation.
    fn reference_scope(&self) -> &'static [&'static str];
}
