pub mod error;
pub mod cursor;
pub mod writer;
pub mod registry;
pub mod record;
pub mod container;
pub mod scene;
pub mod resolve;
pub mod parts;

pub use container::Container;
pub use cursor::{Cursor, Endian};
pub use error::{FormatError, Result};
pub use record::{BaseData, DrawGroups, Record, Shape};
pub use registry::{FormatVersion, ShapeRule, TypeDataRule, VariantLayout, VariantRegistry};
pub use resolve::{disambiguate, resolve, unresolve, HasRefs, Reference};
pub use scene::Scene;
pub use writer::RelocatingWriter;
