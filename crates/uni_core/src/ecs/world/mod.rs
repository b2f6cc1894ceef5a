// world.rs - The world container
//
// A world exclusively owns its component registry, archetype table, chunk
// storages, entity table, private component index, query pool and systems.
// Entity, component, hierarchy, query, system and snapshot operations are
// implemented in the submodules as further `impl World` blocks.

use std::any::TypeId;
use std::collections::HashMap;
use uni_metrics::{Counter, SystemProfiler};

use super::archetype::{ArchetypeInfo, EntityArchetype};
use super::chunk::DataComponentStorage;
use super::component::{ComponentId, ComponentTuple, DataComponent};
use super::entity::Entity;
use super::error::WorldError;
use super::handle::Handle;
use super::metadata::EntityMetadata;
use super::private_component::{PrivateComponent, PrivateComponentStorage};
use super::query::QueryPool;
use super::registry::ComponentRegistry;
use super::system::SystemRegistry;
use super::transform::{GlobalTransform, Transform};
use crate::config::WorldSettings;
use crate::time::WorldTime;

mod components;
mod entities;
mod hierarchy;
mod private;
mod queries;
mod snapshot;
mod systems;

pub use snapshot::{DataComponentBlob, EntitySnapshot, PrivateComponentBlob, WorldSnapshot};

const ENTITIES_CREATED: &str = "entities_created";
const ENTITIES_DELETED: &str = "entities_deleted";
const ENTITIES_ALIVE: &str = "entities_alive";
const STRUCTURAL_MOVES: &str = "structural_moves";
const CHUNKS_ALLOCATED: &str = "chunks_allocated";

pub struct World {
    name: String,
    settings: WorldSettings,
    registry: ComponentRegistry,
    archetypes: Vec<ArchetypeInfo>,
    archetype_lookup: HashMap<Vec<ComponentId>, EntityArchetype>,
    storages: Vec<DataComponentStorage>,
    entity_metadata: Vec<EntityMetadata>,
    free_entities: Vec<u32>,
    handle_map: HashMap<Handle, Entity>,
    private_storage: PrivateComponentStorage,
    queries: QueryPool,
    systems: SystemRegistry,
    phase_running: bool,
    pending_system_removals: Vec<TypeId>,
    pool: Option<rayon::ThreadPool>,
    time: WorldTime,
    counters: Counter,
    profiler: SystemProfiler,
}

impl World {
    pub fn new() -> Self {
        Self::with_settings(WorldSettings::default())
    }

    pub fn with_settings(settings: WorldSettings) -> Self {
        let settings = settings.validate();
        let chunk_bytes = settings.chunk_byte_budget;
        let empty = ArchetypeInfo::empty(chunk_bytes);

        let mut world = Self {
            name: "World".to_string(),
            pool: build_pool(settings.worker_threads),
            time: WorldTime::new(settings.fixed_time_step),
            registry: ComponentRegistry::new(),
            archetype_lookup: HashMap::from([(Vec::new(), EntityArchetype::EMPTY)]),
            storages: vec![DataComponentStorage::new(&empty, chunk_bytes)],
            archetypes: vec![empty],
            // Row 0 is the permanent null entity.
            entity_metadata: vec![EntityMetadata::vacant(0)],
            free_entities: Vec::new(),
            handle_map: HashMap::new(),
            private_storage: PrivateComponentStorage::default(),
            queries: QueryPool::default(),
            systems: SystemRegistry::default(),
            phase_running: false,
            pending_system_removals: Vec::new(),
            counters: Counter::new(),
            profiler: SystemProfiler::new(),
            settings,
        };

        for result in [
            world.register_data_component::<Transform>("Transform"),
            world.register_data_component::<GlobalTransform>("GlobalTransform"),
        ] {
            if let Err(err) = result {
                tracing::error!(%err, "failed to register built-in component");
            }
        }

        tracing::debug!(
            chunk_bytes,
            worker_threads = world.settings.worker_threads,
            "world created"
        );
        world
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn time(&self) -> &WorldTime {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut WorldTime {
        &mut self.time
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    pub fn profiler(&self) -> &SystemProfiler {
        &self.profiler
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn register_data_component<T: DataComponent>(
        &mut self,
        name: &str,
    ) -> Result<ComponentId, WorldError> {
        self.registry.register_data::<T>(name).map_err(|err| {
            tracing::error!(component = name, %err, "data component registration refused");
            err.into()
        })
    }

    pub fn register_private_component<T: PrivateComponent + Default>(
        &mut self,
        name: &str,
    ) -> Result<ComponentId, WorldError> {
        self.registry.register_private::<T>(name).map_err(|err| {
            tracing::error!(component = name, %err, "private component registration refused");
            err.into()
        })
    }

    /// Archetype holding exactly the components in `Q`, created on first request.
    pub fn create_entity_archetype<Q: ComponentTuple>(
        &mut self,
        name: &str,
    ) -> Result<EntityArchetype, WorldError> {
        let ids = self.resolve_tuple::<Q>()?;
        self.archetype_for_ids(Some(name), &ids)
    }

    /// Like [`create_entity_archetype`](Self::create_entity_archetype) for runtime id lists.
    pub fn create_entity_archetype_from_ids(
        &mut self,
        name: &str,
        ids: &[ComponentId],
    ) -> Result<EntityArchetype, WorldError> {
        self.archetype_for_ids(Some(name), ids)
    }

    pub fn archetype_info(&self, archetype: EntityArchetype) -> Result<&ArchetypeInfo, WorldError> {
        self.archetypes
            .get(archetype.index() as usize)
            .ok_or(WorldError::InvalidArchetype { archetype })
    }

    pub fn archetypes(&self) -> &[ArchetypeInfo] {
        &self.archetypes
    }

    /// Live entities stored in `archetype`.
    pub fn archetype_entity_count(&self, archetype: EntityArchetype) -> Result<usize, WorldError> {
        self.storage(archetype).map(DataComponentStorage::len)
    }

    pub fn archetype_chunk_count(&self, archetype: EntityArchetype) -> Result<usize, WorldError> {
        self.storage(archetype).map(DataComponentStorage::chunk_count)
    }

    /// Entities of `archetype` in slot order.
    pub fn archetype_entities(&self, archetype: EntityArchetype) -> Result<&[Entity], WorldError> {
        self.storage(archetype).map(DataComponentStorage::entities)
    }

    /// Delete every entity and free every chunk.
    ///
    /// Archetype definitions, registrations, queries and systems survive.
    /// Entity rows are recycled, so handles from before the purge stay invalid.
    pub fn purge(&mut self) {
        let mut purged = 0;
        for index in 1..self.entity_metadata.len() {
            let row = &mut self.entity_metadata[index];
            if !row.alive {
                continue;
            }
            let entity = Entity::new(index as u32, row.version);
            for element in row.private_components.iter_mut() {
                element.component.on_destroy(entity);
            }
            row.vacate();
            purged += 1;
        }
        for storage in &mut self.storages {
            storage.clear();
        }
        self.free_entities = (1..self.entity_metadata.len() as u32)
            .rev()
            .filter(|&index| !self.entity_metadata[index as usize].is_retired())
            .collect();
        self.handle_map.clear();
        self.private_storage.clear();
        self.counters.increment(ENTITIES_DELETED, purged);
        self.counters.set(ENTITIES_ALIVE, 0);
        tracing::debug!(world = %self.name, purged, "world purged");
    }

    fn storage(&self, archetype: EntityArchetype) -> Result<&DataComponentStorage, WorldError> {
        self.storages
            .get(archetype.index() as usize)
            .ok_or(WorldError::InvalidArchetype { archetype })
    }

    /// Registered data component id for a Rust type.
    fn data_id_of(&self, type_id: TypeId, type_name: &str) -> Result<ComponentId, WorldError> {
        match self.registry.id_of_type_id(type_id) {
            Some(id) if self.registry.data_type(id).is_some() => Ok(id),
            _ => {
                tracing::warn!(component = type_name, "component type is not a registered data component");
                Err(WorldError::UnregisteredComponent {
                    type_name: type_name.to_string(),
                })
            }
        }
    }

    fn data_id<T: 'static>(&self) -> Result<ComponentId, WorldError> {
        self.data_id_of(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    fn resolve_tuple<Q: ComponentTuple>(&self) -> Result<Vec<ComponentId>, WorldError> {
        Q::type_ids()
            .into_iter()
            .zip(Q::type_names())
            .map(|(type_id, type_name)| self.data_id_of(type_id, type_name))
            .collect()
    }

    fn check_data_ids(&self, ids: &[ComponentId]) -> Result<(), WorldError> {
        match ids.iter().find(|&&id| self.registry.data_type(id).is_none()) {
            Some(id) => {
                tracing::warn!(%id, "component id is not a registered data component");
                Err(WorldError::UnregisteredComponent {
                    type_name: id.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    fn component_name(&self, id: ComponentId) -> String {
        self.registry.name_of(id).unwrap_or("<unknown>").to_string()
    }

    /// Find or create the archetype for a component set.
    ///
    /// Without a name, the archetype is named after its components.
    fn archetype_for_ids(
        &mut self,
        name: Option<&str>,
        ids: &[ComponentId],
    ) -> Result<EntityArchetype, WorldError> {
        let mut key = ids.to_vec();
        key.sort_unstable();
        key.dedup();
        if let Some(&archetype) = self.archetype_lookup.get(&key) {
            return Ok(archetype);
        }

        self.check_data_ids(&key)?;
        let types: Vec<_> = key
            .iter()
            .filter_map(|&id| self.registry.data_type(id).cloned())
            .collect();
        let name = match name {
            Some(name) => name.to_string(),
            None => types
                .iter()
                .map(|ty| ty.name.as_str())
                .collect::<Vec<_>>()
                .join("|"),
        };

        let chunk_bytes = self.settings.chunk_byte_budget;
        let info = ArchetypeInfo::new(&name, types, chunk_bytes).map_err(|err| {
            tracing::error!(archetype = %name, %err, "archetype does not fit in a chunk");
            err
        })?;
        let archetype = EntityArchetype::new(self.archetypes.len() as u32);
        tracing::debug!(
            %archetype,
            name = %name,
            entity_size = info.entity_size(),
            chunk_capacity = info.chunk_capacity(),
            "archetype created"
        );
        self.storages.push(DataComponentStorage::new(&info, chunk_bytes));
        self.archetypes.push(info);
        self.archetype_lookup.insert(key, archetype);
        Ok(archetype)
    }

    /// Metadata row for a live entity, or `InvalidEntity`.
    fn meta(&self, entity: Entity) -> Result<&EntityMetadata, WorldError> {
        match self.entity_metadata.get(entity.index() as usize) {
            Some(row) if !entity.is_null() && row.alive && row.version == entity.version() => Ok(row),
            _ => Err(invalid_entity(entity)),
        }
    }

    fn meta_mut(&mut self, entity: Entity) -> Result<&mut EntityMetadata, WorldError> {
        match self.entity_metadata.get_mut(entity.index() as usize) {
            Some(row) if !entity.is_null() && row.alive && row.version == entity.version() => Ok(row),
            _ => Err(invalid_entity(entity)),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_entity(entity: Entity) -> WorldError {
    tracing::warn!(%entity, "invalid entity");
    WorldError::InvalidEntity { entity }
}

fn build_pool(worker_threads: usize) -> Option<rayon::ThreadPool> {
    if worker_threads == 0 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(worker_threads)
        .thread_name(|index| format!("uni-worker-{index}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!(%err, worker_threads, "worker pool unavailable, using rayon's global pool");
            None
        }
    }
}
