use proptest::prelude::*;

use scenebin::parts::{
    Actor, MapPiece, PartsRegistry, Prop, SoundRegion, WorldKind, PARTS_CONTAINER,
    REGIONS_CONTAINER,
};
use scenebin::{
    BaseData, Container, DrawGroups, FormatError, Record, Reference, Scene, Shape, ShapeRule,
    TypeDataRule, VariantRegistry,
};

fn record(name: &str, payload: WorldKind) -> Record<WorldKind> {
    let reg = PartsRegistry;
    let layout = reg.layout(reg.discriminator_of(&payload)).unwrap();
    Record {
        name: name.to_string(),
        id: 0,
        base: BaseData::default(),
        groups: layout.extra_base_block.then(DrawGroups::default),
        shape: match layout.shape {
            ShapeRule::Always => Some(Shape::Point),
            _ => None,
        },
        type_data_present: matches!(
            layout.type_data,
            TypeDataRule::Always | TypeDataRule::Flagged
        ),
        payload,
    }
}

fn sample_scene(version: u32) -> Scene<WorldKind> {
    let mut scene = Scene::new(version);

    let mut parts = Container::new(PARTS_CONTAINER);
    parts.records.push(record(
        "m0000",
        WorldKind::MapPiece(MapPiece { lod_bias: 1.5, tint: 0xFFEE_DDCC }),
    ));
    parts.records.push(record(
        "crate0",
        WorldKind::Prop(Prop { attach: Reference::Index(0), break_stage: 2 }),
    ));
    parts.records.push(record(
        "soldier",
        WorldKind::Actor(Actor { collision: Reference::Index(0), think_id: 110, talk_id: -1 }),
    ));
    parts.records.push(record("start", WorldKind::PlayerStart));

    let mut regions = Container::new(REGIONS_CONTAINER);
    let mut ambience = record(
        "ambience",
        WorldKind::SoundRegion(SoundRegion { bank: 3, volume: 0.8 }),
    );
    ambience.shape = Some(Shape::Sphere { radius: 4.0 });
    regions.records.push(ambience);
    regions.records.push(record("trigger", WorldKind::TriggerRegion));

    scene.containers.push(parts);
    scene.containers.push(regions);
    scene
}

#[test]
fn test_write_parse_preserves_model() {
    let scene = sample_scene(2);
    let bytes = scene.write(&PartsRegistry).unwrap();
    let parsed = Scene::parse(&bytes, &PartsRegistry).unwrap();
    assert_eq!(parsed, scene);
}

#[test]
fn test_byte_roundtrip_identity() {
    let scene = sample_scene(2);
    let bytes = scene.write(&PartsRegistry).unwrap();
    let parsed = Scene::parse(&bytes, &PartsRegistry).unwrap();
    let rewritten = parsed.write(&PartsRegistry).unwrap();
    assert_eq!(bytes, rewritten, "re-serialization must be byte-identical");
}

#[test]
fn test_legacy_version_roundtrip() {
    // Version 1: anchor-relative type-name offsets, 4-byte name alignment,
    // and the spurious zero-length placeholder block after each type name.
    let scene = sample_scene(1);
    let bytes = scene.write(&PartsRegistry).unwrap();
    let parsed = Scene::parse(&bytes, &PartsRegistry).unwrap();
    assert_eq!(parsed, scene);
    assert_eq!(bytes, parsed.write(&PartsRegistry).unwrap());
}

#[test]
fn test_big_endian_roundtrip() {
    let mut scene = sample_scene(2);
    scene.header.flags = [1, 0, 0, 0];
    let bytes = scene.write(&PartsRegistry).unwrap();
    let parsed = Scene::parse(&bytes, &PartsRegistry).unwrap();
    assert_eq!(parsed, scene);
    assert_eq!(bytes, parsed.write(&PartsRegistry).unwrap());
}

#[test]
fn test_empty_containers() {
    let mut scene = Scene::new(2);
    scene.containers.push(Container::new(PARTS_CONTAINER));
    scene.containers.push(Container::new(REGIONS_CONTAINER));
    let bytes = scene.write(&PartsRegistry).unwrap();

    // PARTS container starts right after the 16-byte file header.
    // An empty container still declares one offset: its own type-name slot.
    let count_plus_one = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
    assert_eq!(count_plus_one, 1);

    // Type name is stored absolute in version 2, directly after the
    // header fields at byte 40.
    let name_offset = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
    assert_eq!(name_offset, 40);

    // The next-container offset points immediately past the padded name.
    let next = u64::from_le_bytes(bytes[32..40].try_into().unwrap());
    assert_eq!(next, 56);

    let parsed = Scene::parse(&bytes, &PartsRegistry).unwrap();
    assert_eq!(parsed, scene);
}

#[test]
fn test_unknown_discriminator_is_fatal() {
    let scene = sample_scene(2);
    let mut bytes = scene.write(&PartsRegistry).unwrap();

    // First record offset lives at byte 32 of the PARTS container header;
    // the discriminator sits 8 bytes into the record.
    let rec0 = u64::from_le_bytes(bytes[32..40].try_into().unwrap()) as usize;
    bytes[rec0 + 8..rec0 + 12].copy_from_slice(&999u32.to_le_bytes());

    match Scene::parse(&bytes, &PartsRegistry) {
        Err(FormatError::UnsupportedVariant { discriminator, position, family }) => {
            assert_eq!(discriminator, 999);
            assert_eq!(position, rec0 as u64);
            assert_eq!(family, "record");
        }
        other => panic!("expected UnsupportedVariant, got {other:?}"),
    }
}

#[test]
fn test_container_type_name_mismatch() {
    let scene = sample_scene(2);
    let mut bytes = scene.write(&PartsRegistry).unwrap();

    // Corrupt the second UTF-16 unit of the PARTS type name.
    let name_pos = u64::from_le_bytes(bytes[24..32].try_into().unwrap()) as usize;
    bytes[name_pos + 2] = b'X';

    assert!(matches!(
        Scene::parse(&bytes, &PartsRegistry),
        Err(FormatError::StructuralMismatch { context: "container type name", .. })
    ));
}

#[test]
fn test_bad_magic_is_rejected() {
    let scene = sample_scene(2);
    let mut bytes = scene.write(&PartsRegistry).unwrap();
    bytes[0] = b'Z';
    assert!(matches!(
        Scene::parse(&bytes, &PartsRegistry),
        Err(FormatError::StructuralMismatch { position: 0, .. })
    ));
}

#[test]
fn test_absent_flagged_block_roundtrips() {
    let mut scene = sample_scene(2);
    // Strip the prop's optional type block; its payload reverts to defaults.
    {
        let parts = scene.container_mut(PARTS_CONTAINER).unwrap();
        let prop = &mut parts.records[1];
        prop.type_data_present = false;
        prop.payload = WorldKind::Prop(Prop::default());
    }
    let bytes = scene.write(&PartsRegistry).unwrap();
    let parsed = Scene::parse(&bytes, &PartsRegistry).unwrap();
    assert_eq!(parsed, scene);
    assert!(!parsed.container(PARTS_CONTAINER).unwrap().records[1].type_data_present);
    assert_eq!(bytes, parsed.write(&PartsRegistry).unwrap());
}

#[test]
fn test_on_disk_roundtrip() {
    let temp = tempfile::NamedTempFile::new().unwrap();
    let scene = sample_scene(2);
    std::fs::write(temp.path(), scene.write(&PartsRegistry).unwrap()).unwrap();

    let bytes = std::fs::read(temp.path()).unwrap();
    let parsed = Scene::parse(&bytes, &PartsRegistry).unwrap();
    assert_eq!(parsed, scene);
}

#[test]
fn test_json_dump_is_valid() {
    let scene = sample_scene(2);
    let json = scene.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["containers"][0]["name"], "PARTS");
    assert_eq!(value["containers"][0]["records"][0]["name"], "m0000");
}

proptest! {
    #[test]
    fn prop_parse_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = Scene::parse(&bytes, &PartsRegistry);
    }

    #[test]
    fn prop_parse_flipped_byte_never_panics(pos in 0usize..64, val in any::<u8>()) {
        let mut bytes = sample_scene(2).write(&PartsRegistry).unwrap();
        let pos = pos % bytes.len();
        bytes[pos] = val;
        let _ = Scene::parse(&bytes, &PartsRegistry);
    }

    #[test]
    fn prop_truncated_header_is_rejected(cut in 0usize..16) {
        let bytes = sample_scene(2).write(&PartsRegistry).unwrap();
        prop_assert!(Scene::parse(&bytes[..cut], &PartsRegistry).is_err());
    }
}

#[test]
fn test_out_of_order_containers_rejected_at_write() {
    let mut scene = sample_scene(2);
    scene.containers.swap(0, 1);
    assert!(matches!(
        scene.write(&PartsRegistry),
        Err(FormatError::InternalConsistency(_))
    ));
}
