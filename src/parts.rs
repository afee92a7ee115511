//! Representative "world parts" record family and its registry.
//!
//! This family exists to exercise the generic codec end to end and to serve
//! as the reference implementation of the [`VariantRegistry`] contract.  It
//! deliberately covers every framing rule the codec supports: all four
//! type-data presence rules, optional and mandatory shape data, the second
//! base-data block, and reference fields in two variants.
//!
//! The fixed concatenation order for reference indexing is: map pieces,
//! props, actors, player starts.  Region records live in their own container
//! and do not participate in indexing.

use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::{FormatError, Result};
use crate::registry::{ShapeRule, TypeDataRule, VariantLayout, VariantRegistry};
use crate::resolve::{HasRefs, Reference};
use crate::writer::RelocatingWriter;

/// Container type names, in file order.
pub const PARTS_CONTAINER: &str = "PARTS";
pub const REGIONS_CONTAINER: &str = "REGIONS";

// ── Discriminators ───────────────────────────────────────────────────────────

pub const MAP_PIECE: u32 = 0;
pub const PROP: u32 = 1;
pub const ACTOR: u32 = 2;
pub const PLAYER_START: u32 = 3;
pub const TRIGGER_REGION: u32 = 4;
pub const SOUND_REGION: u32 = 5;

// ── Payloads ─────────────────────────────────────────────────────────────────

/// Static level geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapPiece {
    pub lod_bias: f32,
    pub tint:     u32,
}

/// Placeable object.  Its type block is only sometimes present; the owning
/// record's `type_data_present` flag replays the read-time presence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prop {
    /// Part this prop is attached to, or none.
    pub attach:      Reference,
    pub break_stage: i32,
}

impl Default for Prop {
    fn default() -> Self {
        Self { attach: Reference::None, break_stage: 0 }
    }
}

/// AI-driven entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actor {
    /// Collision part the actor stands on, or none.
    pub collision: Reference,
    pub think_id:  i32,
    pub talk_id:   i32,
}

impl Default for Actor {
    fn default() -> Self {
        Self { collision: Reference::None, think_id: -1, talk_id: -1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SoundRegion {
    pub bank:   i32,
    pub volume: f32,
}

/// Closed tagged union of the family's type-specific blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WorldKind {
    MapPiece(MapPiece),
    Prop(Prop),
    Actor(Actor),
    PlayerStart,
    TriggerRegion,
    SoundRegion(SoundRegion),
}

impl HasRefs for WorldKind {
    fn visit_refs<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Reference) -> Result<()>,
    {
        match self {
            WorldKind::Prop(p)  => f(&mut p.attach),
            WorldKind::Actor(a) => f(&mut a.collision),
            _ => Ok(()),
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

pub struct PartsRegistry;

impl VariantRegistry for PartsRegistry {
    type Payload = WorldKind;

    fn layout(&self, discriminator: u32) -> Option<VariantLayout> {
        Some(match discriminator {
            MAP_PIECE => VariantLayout {
                name:             "MapPiece",
                type_data:        TypeDataRule::Always,
                shape:            ShapeRule::Never,
                extra_base_block: true,
            },
            PROP => VariantLayout {
                name:             "Prop",
                type_data:        TypeDataRule::Flagged,
                shape:            ShapeRule::Never,
                extra_base_block: true,
            },
            ACTOR => VariantLayout {
                name:             "Actor",
                type_data:        TypeDataRule::Always,
                shape:            ShapeRule::Never,
                extra_base_block: true,
            },
            PLAYER_START => VariantLayout {
                name:             "PlayerStart",
                type_data:        TypeDataRule::AlwaysZeroOffset,
                shape:            ShapeRule::Never,
                extra_base_block: false,
            },
            TRIGGER_REGION => VariantLayout {
                name:             "TriggerRegion",
                type_data:        TypeDataRule::Never,
                shape:            ShapeRule::Always,
                extra_base_block: false,
            },
            SOUND_REGION => VariantLayout {
                name:             "SoundRegion",
                type_data:        TypeDataRule::Always,
                shape:            ShapeRule::Optional,
                extra_base_block: false,
            },
            _ => return None,
        })
    }

    fn read_payload(&self, discriminator: u32, cur: &mut Cursor) -> Result<WorldKind> {
        Ok(match discriminator {
            MAP_PIECE => WorldKind::MapPiece(MapPiece {
                lod_bias: cur.read_f32()?,
                tint:     cur.read_u32()?,
            }),
            PROP => {
                // A zero-length view means the flagged block was absent.
                if cur.remaining() == 0 {
                    WorldKind::Prop(Prop::default())
                } else {
                    let attach = Reference::Index(cur.read_i32()?);
                    let break_stage = cur.read_i32()?;
                    cur.assert_i32(&[0], "prop reserved field")?;
                    WorldKind::Prop(Prop { attach, break_stage })
                }
            }
            ACTOR => {
                let collision = Reference::Index(cur.read_i32()?);
                let think_id = cur.read_i32()?;
                let talk_id = cur.read_i32()?;
                cur.assert_i32(&[0], "actor reserved field")?;
                WorldKind::Actor(Actor { collision, think_id, talk_id })
            }
            PLAYER_START => WorldKind::PlayerStart,
            TRIGGER_REGION => WorldKind::TriggerRegion,
            SOUND_REGION => WorldKind::SoundRegion(SoundRegion {
                bank:   cur.read_i32()?,
                volume: cur.read_f32()?,
            }),
            _ => {
                return Err(FormatError::UnsupportedVariant {
                    position:      cur.position(),
                    discriminator,
                    family:        "record",
                })
            }
        })
    }

    fn write_payload(&self, payload: &WorldKind, w: &mut RelocatingWriter) -> Result<()> {
        match payload {
            WorldKind::MapPiece(m) => {
                w.write_f32(m.lod_bias)?;
                w.write_u32(m.tint)?;
            }
            WorldKind::Prop(p) => {
                w.write_i32(p.attach.to_index()?)?;
                w.write_i32(p.break_stage)?;
                w.write_i32(0)?;
            }
            WorldKind::Actor(a) => {
                w.write_i32(a.collision.to_index()?)?;
                w.write_i32(a.think_id)?;
                w.write_i32(a.talk_id)?;
                w.write_i32(0)?;
            }
            WorldKind::PlayerStart | WorldKind::TriggerRegion => {}
            WorldKind::SoundRegion(s) => {
                w.write_i32(s.bank)?;
                w.write_f32(s.volume)?;
            }
        }
        Ok(())
    }

    fn discriminator_of(&self, payload: &WorldKind) -> u32 {
        match payload {
            WorldKind::MapPiece(_)    => MAP_PIECE,
            WorldKind::Prop(_)        => PROP,
            WorldKind::Actor(_)       => ACTOR,
            WorldKind::PlayerStart    => PLAYER_START,
            WorldKind::TriggerRegion  => TRIGGER_REGION,
            WorldKind::SoundRegion(_) => SOUND_REGION,
        }
    }

    fn concat_rank(&self, payload: &WorldKind) -> usize {
        match payload {
            WorldKind::MapPiece(_)    => 0,
            WorldKind::Prop(_)        => 1,
            WorldKind::Actor(_)       => 2,
            WorldKind::PlayerStart    => 3,
            // Regions never participate in indexing; their rank is unused.
            WorldKind::TriggerRegion  => 4,
            WorldKind::SoundRegion(_) => 5,
        }
    }

    fn container_order(&self) -> &'static [&'static str] {
        &[PARTS_CONTAINER, REGIONS_CONTAINER]
    }

    fn reference_scope(&self) -> &'static [&'static str] {
        &[PARTS_CONTAINER]
    }
}
