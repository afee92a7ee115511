use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scenebin::parts::{
    Actor, MapPiece, PartsRegistry, Prop, WorldKind, PARTS_CONTAINER, REGIONS_CONTAINER,
};
use scenebin::{
    resolve, unresolve, BaseData, Container, DrawGroups, Record, Reference, Scene, TypeDataRule,
    VariantRegistry,
};

fn record(name: String, payload: WorldKind) -> Record<WorldKind> {
    let reg = PartsRegistry;
    let layout = reg.layout(reg.discriminator_of(&payload)).unwrap();
    Record {
        name,
        id: 0,
        base: BaseData::default(),
        groups: layout.extra_base_block.then(DrawGroups::default),
        shape: None,
        type_data_present: matches!(
            layout.type_data,
            TypeDataRule::Always | TypeDataRule::Flagged
        ),
        payload,
    }
}

fn big_scene(pieces: usize) -> Scene<WorldKind> {
    let mut scene = Scene::new(2);
    let mut parts = Container::new(PARTS_CONTAINER);
    for i in 0..pieces {
        parts.records.push(record(
            format!("m{i:04}"),
            WorldKind::MapPiece(MapPiece { lod_bias: 0.0, tint: i as u32 }),
        ));
    }
    for i in 0..pieces {
        parts.records.push(record(
            format!("crate{i}"),
            WorldKind::Prop(Prop {
                attach:      Reference::Index((i % pieces) as i32),
                break_stage: 0,
            }),
        ));
    }
    for i in 0..pieces {
        parts.records.push(record(
            format!("actor{i}"),
            WorldKind::Actor(Actor {
                collision: Reference::Index((i % pieces) as i32),
                think_id:  i as i32,
                talk_id:   -1,
            }),
        ));
    }
    scene.containers.push(parts);
    scene.containers.push(Container::new(REGIONS_CONTAINER));
    scene
}

fn bench_serialize(c: &mut Criterion) {
    let scene = big_scene(64);
    c.bench_function("write_192_records", |b| {
        b.iter(|| black_box(&scene).write(&PartsRegistry).unwrap())
    });
}

fn bench_parse(c: &mut Criterion) {
    let bytes = big_scene(64).write(&PartsRegistry).unwrap();
    c.bench_function("parse_192_records", |b| {
        b.iter(|| Scene::parse(black_box(&bytes), &PartsRegistry).unwrap())
    });
}

fn bench_resolve_roundtrip(c: &mut Criterion) {
    let scene = big_scene(64);
    c.bench_function("resolve_unresolve_192_records", |b| {
        b.iter(|| {
            let named = resolve(black_box(&scene), &PartsRegistry).unwrap();
            unresolve(&named, &PartsRegistry).unwrap()
        })
    });
}

criterion_group!(benches, bench_serialize, bench_parse, bench_resolve_roundtrip);
criterion_main!(benches);
