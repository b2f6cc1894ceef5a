use criterion::*;
use std::hint::black_box;

use bytemuck::{Pod, Zeroable};
use uni_core::ecs::{EntityQuery, World};
use uni_core::WorldSettings;

const ENTITIES: usize = 10_000;

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

fn make_world(worker_threads: usize) -> (World, EntityQuery) {
    let mut world = World::with_settings(WorldSettings {
        worker_threads,
        ..WorldSettings::default()
    });
    world.register_data_component::<Position>("Position").unwrap();
    world.register_data_component::<Velocity>("Velocity").unwrap();
    let archetype = world
        .create_entity_archetype::<(Position, Velocity)>("Body")
        .unwrap();
    for (i, entity) in world
        .create_entities(archetype, ENTITIES, "body")
        .unwrap()
        .into_iter()
        .enumerate()
    {
        world
            .set_component_data(entity, Velocity { x: i as f32, y: 1.0, z: 0.5 })
            .unwrap();
    }
    let query = world.create_entity_query();
    world
        .set_query_all_filters::<(Position, Velocity)>(query)
        .unwrap();
    (world, query)
}

fn for_each_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("for_each");
    group.throughput(Throughput::Elements(ENTITIES as u64));

    for parallel in [false, true] {
        let label = if parallel { "parallel_10k" } else { "serial_10k" };
        group.bench_function(label, |b| {
            let (mut world, query) = make_world(4);
            b.iter(|| {
                world
                    .for_each::<(Position, Velocity), _>(query, parallel, |_, _, (p, v)| {
                        p.x += v.x * 0.016;
                        p.y += v.y * 0.016;
                        p.z += v.z * 0.016;
                    })
                    .unwrap();
            });
            black_box(world.entity_count());
        });
    }

    group.finish();
}

criterion_group!(benches, for_each_benchmark);
criterion_main!(benches);
