//! Error taxonomy shared by every layer of the codec.
//!
//! All five variants are unrecoverable for the current parse or write pass:
//! the codec fails fast and surfaces the absolute byte position and the
//! implicated record's declared type or name.  The codec itself never logs;
//! callers decide whether to abort a whole-file load or present a diagnostic.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    /// A strict-assertion read did not match any expected sentinel value.
    #[error("structural mismatch at 0x{position:x} ({context}): expected {expected}, found {found}")]
    StructuralMismatch {
        position: u64,
        expected: String,
        found:    String,
        context:  &'static str,
    },

    /// A discriminator value has no entry in the active variant registry.
    /// Record length is variant-dependent, so dispatch can never skip an
    /// unknown record; it must fail here.
    #[error("unsupported {family} variant 0x{discriminator:08x} at 0x{position:x}")]
    UnsupportedVariant {
        position:      u64,
        discriminator: u32,
        family:        &'static str,
    },

    /// A reference index or jump offset falls outside the buffer or the
    /// concatenated record list.
    #[error("offset {value} out of range ({context}, bound {bound})")]
    OffsetOutOfRange {
        value:   i64,
        bound:   u64,
        context: &'static str,
    },

    /// Unresolve could not find a record with the requested name.
    #[error("no record named {name:?} referenced by {record:?}")]
    ReferenceLookupFailure { name: String, record: String },

    /// A reserved write slot was never filled, filled twice, or the cursor's
    /// step stack was popped while empty.  Always a codec bug, never bad input.
    #[error("internal consistency: {0}")]
    InternalConsistency(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = FormatError> = std::result::Result<T, E>;
