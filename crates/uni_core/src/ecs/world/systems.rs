//! System registration and the frame loop

use std::any::TypeId;

use super::World;
use crate::ecs::entity::Entity;
use crate::ecs::system::{
    System, SystemEntry, SystemGroup, SystemHandle, SystemInfo, SystemPhase, SystemRegistrationError,
};

impl World {
    /// Create and enable a system of type `T`.
    ///
    /// Asking again for a type that is already registered returns its
    /// existing handle. Systems run in (group, rank, creation) order.
    pub fn create_system<T: System + Default>(
        &mut self,
        name: &str,
        group: SystemGroup,
        rank: f32,
    ) -> Result<SystemHandle, SystemRegistrationError> {
        let type_id = TypeId::of::<T>();
        if let Some(handle) = self.systems.handle_of(type_id) {
            return Ok(handle);
        }
        let rank = if rank.is_nan() {
            tracing::warn!(system = name, "NaN system rank, using 0");
            0.0
        } else {
            rank
        };

        let handle = self.systems.reserve(name, type_id).map_err(|err| {
            tracing::error!(system = name, %err, "system registration refused");
            err
        })?;

        let mut system: Box<dyn System> = Box::new(T::default());
        if let Err(source) = system.on_create(self) {
            self.systems.unreserve(name, type_id);
            tracing::error!(system = name, err = %source, "system failed to initialize");
            return Err(SystemRegistrationError::Creation {
                name: name.to_string(),
                source,
            });
        }
        if let Err(err) = system.on_enable(self) {
            tracing::error!(system = name, %err, "system on_enable failed");
        }

        self.systems.insert(SystemEntry {
            handle,
            name: name.to_string(),
            group,
            rank,
            enabled: true,
            started: false,
            type_id,
            system,
        });
        tracing::debug!(system = name, %handle, ?group, rank, "system created");
        Ok(handle)
    }

    /// The registered `T`. Systems are detached while a phase runs, so this
    /// is `None` from inside another system's update.
    pub fn get_system<T: System>(&self) -> Option<&T> {
        self.systems
            .find(TypeId::of::<T>())
            .and_then(SystemEntry::downcast_ref::<T>)
    }

    pub fn get_system_mut<T: System>(&mut self) -> Option<&mut T> {
        self.systems
            .find_mut(TypeId::of::<T>())
            .and_then(SystemEntry::downcast_mut::<T>)
    }

    /// Destroy the registered `T`. Returns `false` if there is none.
    ///
    /// Inside a running phase the removal is queued until the phase ends.
    pub fn destroy_system<T: System>(&mut self) -> bool {
        let type_id = TypeId::of::<T>();
        if self.systems.handle_of(type_id).is_none() {
            return false;
        }
        if self.phase_running {
            if !self.pending_system_removals.contains(&type_id) {
                self.pending_system_removals.push(type_id);
            }
            return true;
        }
        self.finish_destroy(type_id)
    }

    pub fn set_system_enabled(
        &mut self,
        handle: SystemHandle,
        enabled: bool,
    ) -> Result<(), SystemRegistrationError> {
        let Some(position) = self.systems.position(handle) else {
            tracing::warn!(%handle, "unknown system");
            return Err(SystemRegistrationError::UnknownHandle { handle });
        };
        let mut entry = self.systems.detach(position);
        if entry.enabled != enabled {
            entry.enabled = enabled;
            let result = if enabled {
                entry.system.on_enable(self)
            } else {
                entry.system.on_disable(self)
            };
            if let Err(err) = result {
                tracing::error!(system = %entry.name, enabled, %err, "system toggle hook failed");
            }
        }
        self.systems.put_back(entry);
        Ok(())
    }

    /// Registered systems in execution order.
    pub fn systems(&self) -> Vec<SystemInfo> {
        self.systems.infos()
    }

    /// Advance one frame of `delta` seconds.
    ///
    /// Starts systems and private components that have not run yet, then runs
    /// `pre_update`, as many `fixed_update`s as the accumulated time allows
    /// (capped per frame), `update` and `late_update`. Private components of
    /// enabled entities run their hooks before the systems of each phase.
    pub fn update(&mut self, delta: f64) {
        self.time.begin_frame(delta);
        self.profiler.begin_frame();

        self.run_phase(SystemPhase::Start);
        self.run_phase(SystemPhase::PreUpdate);

        let max_steps = self.settings.max_fixed_steps_per_frame;
        let mut steps = 0;
        while self.time.fixed_step_ready() {
            if steps == max_steps {
                let dropped = self.time.drop_backlog();
                tracing::warn!(dropped, max_steps, "fixed update fell behind, backlog dropped");
                break;
            }
            self.run_phase(SystemPhase::FixedUpdate);
            self.time.consume_fixed_step();
            steps += 1;
        }

        self.run_phase(SystemPhase::Update);
        self.run_phase(SystemPhase::LateUpdate);
    }

    fn run_phase(&mut self, phase: SystemPhase) {
        self.run_private_phase(phase);

        let starting = phase == SystemPhase::Start;
        let mut detached = self.systems.take_all();
        self.phase_running = true;
        for entry in detached
            .iter_mut()
            .filter(|entry| entry.enabled && entry.started != starting)
        {
            let key = format!("{}.{}", entry.name, phase);
            let result = uni_metrics::time_scope!(self.profiler, &key, {
                phase.run(entry.system.as_mut(), self)
            });
            if let Err(err) = result {
                tracing::error!(system = %entry.name, %phase, %err, "system failed");
            }
            entry.started = true;
        }
        self.phase_running = false;
        self.systems.restore_all(detached);

        for type_id in std::mem::take(&mut self.pending_system_removals) {
            self.finish_destroy(type_id);
        }
    }

    /// Private component hooks for `phase`, over enabled components of
    /// enabled entities. A component only gets per-frame hooks once started.
    fn run_private_phase(&mut self, phase: SystemPhase) {
        if phase == SystemPhase::PreUpdate {
            return;
        }
        let key = format!("private.{phase}");
        let time = &self.time;
        uni_metrics::time_scope!(self.profiler, &key, {
            for (index, row) in self.entity_metadata.iter_mut().enumerate() {
                if !(row.alive && row.enabled) {
                    continue;
                }
                let owner = Entity::new(index as u32, row.version);
                for element in row.private_components.iter_mut().filter(|element| element.enabled) {
                    let component = &mut *element.component;
                    match (phase, element.started) {
                        (SystemPhase::Start, false) => {
                            component.start(owner);
                            element.started = true;
                        }
                        (SystemPhase::FixedUpdate, true) => component.fixed_update(owner, time),
                        (SystemPhase::Update, true) => component.update(owner, time),
                        (SystemPhase::LateUpdate, true) => component.late_update(owner, time),
                        _ => {}
                    }
                }
            }
        });
    }

    fn finish_destroy(&mut self, type_id: TypeId) -> bool {
        let Some(mut entry) = self.systems.remove(type_id) else {
            return false;
        };
        if entry.enabled {
            if let Err(err) = entry.system.on_disable(self) {
                tracing::error!(system = %entry.name, %err, "system on_disable failed");
            }
        }
        if let Err(err) = entry.system.on_destroy(self) {
            tracing::error!(system = %entry.name, %err, "system on_destroy failed");
        }
        tracing::debug!(system = %entry.name, "system destroyed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldSettings;
    use crate::ecs::error::WorldError;
    use crate::ecs::private_component::PrivateComponent;
    use crate::ecs::system::SystemResult;
    use crate::time::WorldTime;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    macro_rules! tracer {
        ($($name:ident),+) => {$(
            #[derive(Default)]
            struct $name {
                log: Log,
                fixed: u32,
            }

            impl System for $name {
                fn pre_update(&mut self, _world: &mut World) -> SystemResult {
                    self.log.lock().unwrap().push(format!("{}.pre", stringify!($name)));
                    Ok(())
                }

                fn fixed_update(&mut self, _world: &mut World) -> SystemResult {
                    self.fixed += 1;
                    Ok(())
                }

                fn update(&mut self, _world: &mut World) -> SystemResult {
                    self.log.lock().unwrap().push(format!("{}.update", stringify!($name)));
                    Ok(())
                }
            }
        )+};
    }

    tracer!(Input, Physics, Render);

    #[derive(Default)]
    struct Faulty;

    impl System for Faulty {
        fn update(&mut self, _world: &mut World) -> SystemResult {
            Err(WorldError::InvalidEntity { entity: Entity::NULL })
        }
    }

    #[derive(Default)]
    struct OneShot {
        runs: u32,
    }

    impl System for OneShot {
        fn update(&mut self, world: &mut World) -> SystemResult {
            self.runs += 1;
            world.destroy_system::<OneShot>();
            Ok(())
        }
    }

    #[derive(Default)]
    struct Refuses;

    impl System for Refuses {
        fn on_create(&mut self, _world: &mut World) -> SystemResult {
            Err(WorldError::InvalidEntity { entity: Entity::NULL })
        }
    }

    #[derive(Default)]
    struct Spawner;

    impl System for Spawner {
        fn on_create(&mut self, world: &mut World) -> SystemResult {
            world.create_entity("spawned by system");
            Ok(())
        }

        fn update(&mut self, world: &mut World) -> SystemResult {
            world.create_entity("per frame");
            Ok(())
        }
    }

    #[derive(Default)]
    struct Clock {
        starts: u32,
        fixed: u32,
        updates: u32,
    }

    impl System for Clock {
        fn start(&mut self, _world: &mut World) -> SystemResult {
            self.starts += 1;
            Ok(())
        }

        fn fixed_update(&mut self, _world: &mut World) -> SystemResult {
            self.fixed += 1;
            Ok(())
        }

        fn update(&mut self, _world: &mut World) -> SystemResult {
            self.updates += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Ticker {
        starts: u32,
        fixed: u32,
        updates: u32,
        late: u32,
        steps: f64,
    }

    impl PrivateComponent for Ticker {
        fn start(&mut self, _owner: Entity) {
            self.starts += 1;
        }

        fn fixed_update(&mut self, _owner: Entity, time: &WorldTime) {
            self.fixed += 1;
            self.steps += time.time_step();
        }

        fn update(&mut self, _owner: Entity, _time: &WorldTime) {
            self.updates += 1;
        }

        fn late_update(&mut self, _owner: Entity, _time: &WorldTime) {
            self.late += 1;
        }
    }

    fn world_with_step(step: f64) -> World {
        World::with_settings(WorldSettings {
            fixed_time_step: step,
            ..WorldSettings::default()
        })
    }

    fn attach(world: &mut World, log: &Log) {
        world.get_system_mut::<Input>().unwrap().log = log.clone();
        world.get_system_mut::<Physics>().unwrap().log = log.clone();
        world.get_system_mut::<Render>().unwrap().log = log.clone();
    }

    #[test]
    fn systems_run_in_group_then_rank_order() {
        let mut world = World::new();
        world.create_system::<Render>("Render", SystemGroup::Presentation, 0.0).unwrap();
        world.create_system::<Physics>("Physics", SystemGroup::Simulation, 1.0).unwrap();
        world.create_system::<Input>("Input", SystemGroup::Simulation, -1.0).unwrap();
        let log = Log::default();
        attach(&mut world, &log);

        world.update(0.0);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "Input.pre",
                "Physics.pre",
                "Render.pre",
                "Input.update",
                "Physics.update",
                "Render.update"
            ]
        );
        let names: Vec<_> = world.systems().into_iter().map(|info| info.name).collect();
        assert_eq!(names, vec!["Input", "Physics", "Render"]);
        assert!(world.profiler().timing("Physics.update").is_some() || cfg!(not(feature = "metrics")));
    }

    #[test]
    fn creating_twice_returns_the_same_handle() {
        let mut world = World::new();
        let first = world.create_system::<Input>("Input", SystemGroup::Preparation, 0.0).unwrap();
        let again = world.create_system::<Input>("Other", SystemGroup::Simulation, 3.0).unwrap();
        assert_eq!(first, again);
        assert_eq!(world.systems().len(), 1);
        assert!(matches!(
            world.create_system::<Physics>("Input", SystemGroup::Simulation, 0.0),
            Err(SystemRegistrationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn failing_system_does_not_stop_the_frame() {
        let mut world = World::new();
        world.create_system::<Faulty>("Faulty", SystemGroup::Simulation, 0.0).unwrap();
        world.create_system::<Input>("Input", SystemGroup::Simulation, 1.0).unwrap();
        world.create_system::<Physics>("Physics", SystemGroup::Preparation, 0.0).unwrap();
        world.create_system::<Render>("Render", SystemGroup::Presentation, 0.0).unwrap();
        let log = Log::default();
        attach(&mut world, &log);

        world.update(0.016);
        let log = log.lock().unwrap();
        assert!(log.contains(&"Input.update".to_string()));
        assert!(log.contains(&"Render.update".to_string()));
    }

    #[test]
    fn fixed_updates_follow_the_accumulator() {
        let mut world = world_with_step(0.1);
        world.create_system::<Physics>("Physics", SystemGroup::Simulation, 0.0).unwrap();

        world.update(0.25);
        assert_eq!(world.get_system::<Physics>().unwrap().fixed, 2);
        world.update(0.1);
        assert_eq!(world.get_system::<Physics>().unwrap().fixed, 3);
        assert_eq!(world.time().frame_count(), 2);
        assert_eq!(world.time().fixed_step_count(), 3);

        world.update(10.0);
        assert_eq!(world.get_system::<Physics>().unwrap().fixed, 3 + 8);
        assert!(world.time().fixed_delta_time() < 0.1);
    }

    #[test]
    fn disabled_systems_are_skipped() {
        let mut world = world_with_step(0.1);
        let handle = world.create_system::<Physics>("Physics", SystemGroup::Simulation, 0.0).unwrap();
        world.set_system_enabled(handle, false).unwrap();
        world.update(0.3);
        assert_eq!(world.get_system::<Physics>().unwrap().fixed, 0);
        assert!(!world.systems()[0].enabled);

        world.set_system_enabled(handle, true).unwrap();
        world.update(0.1);
        assert!(world.get_system::<Physics>().unwrap().fixed >= 1);
    }

    #[test]
    fn destroy_inside_a_phase_is_deferred() {
        let mut world = World::new();
        world.create_system::<OneShot>("OneShot", SystemGroup::Simulation, 0.0).unwrap();
        world.update(0.0);
        assert!(world.get_system::<OneShot>().is_none());
        assert!(world.systems().is_empty());
        assert!(!world.destroy_system::<OneShot>());
    }

    #[test]
    fn failed_creation_releases_the_name() {
        let mut world = World::new();
        assert!(matches!(
            world.create_system::<Refuses>("Refuses", SystemGroup::Simulation, 0.0),
            Err(SystemRegistrationError::Creation { .. })
        ));
        assert!(world.systems().is_empty());
        world.create_system::<Input>("Refuses", SystemGroup::Simulation, 0.0).unwrap();
    }

    #[test]
    fn systems_can_change_the_world() {
        let mut world = World::new();
        world.create_system::<Spawner>("Spawner", SystemGroup::Simulation, 0.0).unwrap();
        assert_eq!(world.entity_count(), 1);
        world.update(0.016);
        world.update(0.016);
        assert_eq!(world.entity_count(), 3);
        assert!(world.destroy_system::<Spawner>());
        world.update(0.016);
        assert_eq!(world.entity_count(), 3);
    }

    #[test]
    fn start_runs_once_before_per_frame_hooks() {
        let mut world = world_with_step(0.1);
        world.register_private_component::<Ticker>("Ticker").unwrap();
        world.create_system::<Clock>("Clock", SystemGroup::Simulation, 0.0).unwrap();
        let active = world.create_entity("active");
        let hidden = world.create_entity("hidden");
        let muted = world.create_entity("muted");
        for entity in [active, hidden, muted] {
            world.get_or_set_private_component::<Ticker>(entity).unwrap();
        }
        world.set_enable(hidden, false).unwrap();
        world.set_private_component_enabled::<Ticker>(muted, false).unwrap();

        world.update(0.25);
        world.update(0.1);

        let clock = world.get_system::<Clock>().unwrap();
        assert_eq!((clock.starts, clock.fixed, clock.updates), (1, 3, 2));

        let ticker = world.get_private_component::<Ticker>(active).unwrap();
        assert_eq!(
            (ticker.starts, ticker.fixed, ticker.updates, ticker.late),
            (1, 3, 2, 2)
        );
        assert!((ticker.steps - 0.3).abs() < 1e-9);
        for entity in [hidden, muted] {
            let ticker = world.get_private_component::<Ticker>(entity).unwrap();
            assert_eq!((ticker.starts, ticker.updates), (0, 0));
        }

        world.set_enable(hidden, true).unwrap();
        world.update(0.0);
        let ticker = world.get_private_component::<Ticker>(hidden).unwrap();
        assert_eq!((ticker.starts, ticker.updates, ticker.fixed), (1, 1, 0));
        assert_eq!(world.get_private_component::<Ticker>(active).unwrap().starts, 1);
    }

    #[test]
    fn disabled_systems_start_when_first_enabled() {
        let mut world = World::new();
        let handle = world.create_system::<Clock>("Clock", SystemGroup::Simulation, 0.0).unwrap();
        world.set_system_enabled(handle, false).unwrap();
        world.update(0.0);
        assert_eq!(world.get_system::<Clock>().unwrap().starts, 0);

        world.set_system_enabled(handle, true).unwrap();
        world.update(0.0);
        world.update(0.0);
        let clock = world.get_system::<Clock>().unwrap();
        assert_eq!((clock.starts, clock.updates), (1, 2));
    }

    #[test]
    fn replaced_private_components_start_again() {
        let mut world = World::new();
        world.register_private_component::<Ticker>("Ticker").unwrap();
        let entity = world.create_entity("e");
        world.get_or_set_private_component::<Ticker>(entity).unwrap();
        world.update(0.0);
        world.set_private_component(entity, Ticker::default()).unwrap();
        world.update(0.0);
        let ticker = world.get_private_component::<Ticker>(entity).unwrap();
        assert_eq!((ticker.starts, ticker.updates), (1, 1));
    }
}
