//! Uni Runtime
//!
//! Boots logging, builds a world from optional settings and drives a short
//! simulation through the frame loop.

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use tracing_subscriber::EnvFilter;
use uni_core::ecs::{EntityQuery, System, SystemGroup, SystemResult, World};
use uni_core::WorldSettings;
use uni_metrics::FrameTimer;

const BODIES: usize = 5_000;
const FRAMES: u64 = 300;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

/// Integrates velocity on every fixed step.
#[derive(Default)]
struct Movement {
    query: Option<EntityQuery>,
}

impl System for Movement {
    fn on_create(&mut self, world: &mut World) -> SystemResult {
        let query = world.create_entity_query();
        world.set_query_all_filters::<(Position, Velocity)>(query)?;
        self.query = Some(query);
        Ok(())
    }

    fn on_destroy(&mut self, world: &mut World) -> SystemResult {
        match self.query.take() {
            Some(query) => world.release_entity_query(query),
            None => Ok(()),
        }
    }

    fn fixed_update(&mut self, world: &mut World) -> SystemResult {
        let Some(query) = self.query else {
            return Ok(());
        };
        let step = world.time().time_step() as f32;
        world.for_each::<(Position, Velocity), _>(query, true, |_, _, (position, velocity)| {
            position.x += velocity.x * step;
            position.y += velocity.y * step;
            position.z += velocity.z * step;
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Uni ECS v{}", uni_core::VERSION);

    let settings = match std::env::args().nth(1) {
        Some(path) => WorldSettings::load(&path).with_context(|| format!("loading settings from {path}"))?,
        None => WorldSettings::default(),
    };
    let mut world = World::with_settings(settings);

    world.register_data_component::<Position>("Position")?;
    world.register_data_component::<Velocity>("Velocity")?;
    let bodies = world.create_entity_archetype::<(Position, Velocity)>("Body")?;
    for (i, entity) in world.create_entities(bodies, BODIES, "body")?.into_iter().enumerate() {
        let angle = i as f32 * 0.01;
        world.set_component_data(entity, Velocity { x: angle.cos(), y: angle.sin(), z: 0.0 })?;
    }
    world.create_system::<Movement>("Movement", SystemGroup::Simulation, 0.0)?;
    tracing::info!(
        entities = world.entity_count(),
        archetypes = world.archetypes().len(),
        chunks = world.archetype_chunk_count(bodies)?,
        "world populated"
    );

    let delta = world.time().time_step();
    let mut timer = FrameTimer::new(60);
    for frame in 1..=FRAMES {
        timer.begin();
        world.update(delta);
        timer.end();
        if frame % 60 == 0 {
            let (min_ms, max_ms) = timer.frame_time_range_ms();
            tracing::info!(
                frame,
                fps = timer.fps().round(),
                frame_ms = timer.frame_time_ms(),
                min_ms,
                max_ms,
                "frame stats"
            );
        }
    }

    for (name, timing) in world.profiler().iter() {
        tracing::info!(system = name, calls = timing.calls, total_ms = timing.total.as_secs_f64() * 1e3, "system timing");
    }
    for (name, value) in world.counters().iter() {
        tracing::info!(counter = name, value, "counter");
    }

    world.destroy_system::<Movement>();
    tracing::info!(elapsed = world.time().elapsed(), "simulation finished");
    Ok(())
}
