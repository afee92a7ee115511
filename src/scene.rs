//! Whole-file framing — the primary embedding surface.
//!
//! A scene file is a fixed header (magic tag, format version, header size,
//! flag bytes) followed by a chain of containers linked through their
//! next-container offsets.  The chain's composition is fixed per record
//! family: [`crate::registry::VariantRegistry::container_order`] names the
//! expected containers in file order, and both parse and write enforce it.
//!
//! ```no_run
//! use scenebin::parts::PartsRegistry;
//! use scenebin::scene::Scene;
//!
//! let bytes = std::fs::read("m10_00.sgrf")?;
//! let scene = Scene::parse(&bytes, &PartsRegistry)?;
//! let named = scenebin::resolve::resolve(&scene, &PartsRegistry)?;
//! println!("{}", named.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Re-serializing an unmodified parsed file reproduces the original bytes
//! exactly, reserved zero fields, alignment padding, and legacy placeholder
//! blocks included.

use serde::Serialize;

use crate::container::{read_container, write_container, Container};
use crate::cursor::{Cursor, Endian};
use crate::error::{FormatError, Result};
use crate::registry::{FormatVersion, VariantRegistry};
use crate::writer::RelocatingWriter;

/// File magic tag.
pub const MAGIC: &str = "SGRF";
/// Size of the fixed file header in bytes.
pub const FILE_HEADER_SIZE: u32 = 16;

/// Fixed file header.  The header itself is always little-endian; the
/// endianness flag in `flags[0]` governs the containers that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub version: u32,
    pub flags:   [u8; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene<P> {
    pub header:     FileHeader,
    pub containers: Vec<Container<P>>,
}

impl<P> Scene<P> {
    pub fn new(version: u32) -> Self {
        Self {
            header:     FileHeader { version, flags: [0; 4] },
            containers: Vec::new(),
        }
    }

    pub fn container(&self, name: &str) -> Option<&Container<P>> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut Container<P>> {
        self.containers.iter_mut().find(|c| c.name == name)
    }

    /// Pretty JSON dump of the in-memory model, for inspection tooling.
    pub fn to_json(&self) -> serde_json::Result<String>
    where
        P: Serialize,
    {
        serde_json::to_string_pretty(self)
    }

    /// Parse a complete scene file from a fully buffered byte sequence.
    pub fn parse<R: VariantRegistry<Payload = P>>(bytes: &[u8], reg: &R) -> Result<Self> {
        let mut cur = Cursor::new(bytes, Endian::Little);

        let magic = cur.read_ascii(4)?;
        if magic != MAGIC {
            return Err(FormatError::StructuralMismatch {
                position: 0,
                expected: format!("magic tag {MAGIC:?}"),
                found:    format!("{magic:?}"),
                context:  "file header",
            });
        }
        let version = cur.read_u32()?;
        let header_size = cur.assert_u32(&[FILE_HEADER_SIZE], "file header size")?;
        let mut flags = [0u8; 4];
        for b in &mut flags {
            *b = cur.read_u8()?;
        }

        let ver = FormatVersion::from_header(version, flags)?;
        cur.set_endian(ver.endian);
        cur.set_position(header_size as u64);

        let order = reg.container_order();
        let mut containers = Vec::with_capacity(order.len());
        for (i, expected) in order.iter().enumerate() {
            let chain_pos = cur.position();
            let (container, next) = read_container(&mut cur, reg, &ver, expected)?;
            let last = i + 1 == order.len();
            if last && next != 0 {
                return Err(FormatError::StructuralMismatch {
                    position: chain_pos,
                    expected: "end of container chain (next offset 0)".into(),
                    found:    format!("next offset 0x{next:x}"),
                    context:  "container chain",
                });
            }
            if !last && next == 0 {
                return Err(FormatError::StructuralMismatch {
                    position: chain_pos,
                    expected: format!("chained {:?} container", order[i + 1]),
                    found:    "end of chain".into(),
                    context:  "container chain",
                });
            }
            containers.push(container);
        }

        Ok(Scene { header: FileHeader { version, flags }, containers })
    }

    /// Serialize the scene, producing the complete file bytes.
    ///
    /// Reference fields must be in their physical (index) projection; run
    /// [`crate::resolve::unresolve`] first if the scene carries names.
    pub fn write<R: VariantRegistry<Payload = P>>(&self, reg: &R) -> Result<Vec<u8>> {
        let ver = FormatVersion::from_header(self.header.version, self.header.flags)?;

        let order = reg.container_order();
        if self.containers.len() != order.len() {
            return Err(FormatError::InternalConsistency(format!(
                "scene has {} containers, the format expects {}",
                self.containers.len(),
                order.len()
            )));
        }
        for (container, expected) in self.containers.iter().zip(order) {
            if container.name != *expected {
                return Err(FormatError::InternalConsistency(format!(
                    "container {:?} out of order, expected {:?}",
                    container.name, expected
                )));
            }
        }

        let mut w = RelocatingWriter::new(Endian::Little);
        w.write_ascii(MAGIC, 4)?;
        w.write_u32(self.header.version)?;
        w.write_u32(FILE_HEADER_SIZE)?;
        w.write_bytes(&self.header.flags)?;
        w.set_endian(ver.endian);

        for (i, container) in self.containers.iter().enumerate() {
            if i > 0 {
                w.fill_here_u64(&format!("c{}.next", i - 1))?;
            }
            write_container(&mut w, container, reg, &ver, &format!("c{i}"))?;
        }
        if let Some(last) = self.containers.len().checked_sub(1) {
            w.fill_u64(&format!("c{last}.next"), 0)?;
        }

        w.finish()
    }
}
