//! Entity lifecycle and metadata

use super::{World, CHUNKS_ALLOCATED, ENTITIES_ALIVE, ENTITIES_CREATED, ENTITIES_DELETED};
use crate::ecs::archetype::EntityArchetype;
use crate::ecs::component::ComponentTuple;
use crate::ecs::entity::Entity;
use crate::ecs::error::WorldError;
use crate::ecs::handle::Handle;
use crate::ecs::metadata::EntityMetadata;

impl World {
    /// Create an entity with no data components.
    pub fn create_entity(&mut self, name: &str) -> Entity {
        self.spawn_into(EntityArchetype::EMPTY, name, Handle::new())
    }

    /// Create an entity in `archetype` with zeroed component data.
    pub fn create_entity_with(
        &mut self,
        archetype: EntityArchetype,
        name: &str,
    ) -> Result<Entity, WorldError> {
        self.check_archetype(archetype)?;
        Ok(self.spawn_into(archetype, name, Handle::new()))
    }

    /// Create an entity with a known persistent handle. A null handle draws a new one.
    pub fn create_entity_with_handle(
        &mut self,
        archetype: EntityArchetype,
        name: &str,
        handle: Handle,
    ) -> Result<Entity, WorldError> {
        self.check_archetype(archetype)?;
        let handle = if handle.is_null() { Handle::new() } else { handle };
        if self.handle_map.contains_key(&handle) {
            tracing::warn!(%handle, "handle already belongs to a live entity");
            return Err(WorldError::DuplicateHandle { handle });
        }
        Ok(self.spawn_into(archetype, name, handle))
    }

    /// Create `amount` entities in `archetype`, all named `name`.
    pub fn create_entities(
        &mut self,
        archetype: EntityArchetype,
        amount: usize,
        name: &str,
    ) -> Result<Vec<Entity>, WorldError> {
        self.check_archetype(archetype)?;
        self.entity_metadata
            .reserve(amount.saturating_sub(self.free_entities.len()));
        Ok((0..amount)
            .map(|_| self.spawn_into(archetype, name, Handle::new()))
            .collect())
    }

    /// Create an entity holding exactly the components in `values`.
    ///
    /// The archetype is found or created from the value types, so the
    /// entity never migrates. See [`spawn!`](crate::spawn).
    pub fn spawn_bundle<Q: ComponentTuple>(&mut self, name: &str, values: Q) -> Result<Entity, WorldError> {
        let ids = self.resolve_tuple::<Q>()?;
        for (position, id) in ids.iter().enumerate() {
            if ids[..position].contains(id) {
                let component = self.component_name(*id);
                tracing::warn!(component = %component, "component given twice in one bundle");
                return Err(WorldError::AliasedComponent { component });
            }
        }
        let archetype = self.archetype_for_ids(None, &ids)?;
        let entity = self.spawn_into(archetype, name, Handle::new());
        let slot = self.entity_metadata[entity.index() as usize].chunk_array_index;
        let storage = &mut self.storages[archetype.index() as usize];
        for (id, bytes) in ids.iter().zip(values.component_bytes()) {
            if let Some(index) = storage.type_index(*id) {
                storage.component_bytes_mut(slot, index).copy_from_slice(bytes);
            }
        }
        Ok(entity)
    }

    /// Delete `entity` and, recursively, all of its children.
    ///
    /// Private components see `on_destroy` before they are dropped. The slot
    /// version is bumped so every copy of a deleted entity stops validating.
    pub fn delete_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        let parent = self.meta(entity)?.parent;
        let descendants = self.descendants(entity)?;
        if !parent.is_null() {
            self.entity_metadata[parent.index() as usize]
                .children
                .retain(|&child| child != entity);
        }
        for doomed in descendants.into_iter().rev() {
            self.delete_entity_internal(doomed);
        }
        self.delete_entity_internal(entity);
        Ok(())
    }

    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entity_metadata
            .get(entity.index() as usize)
            .is_some_and(|row| !entity.is_null() && row.alive && row.version == entity.version())
    }

    pub fn entity_name(&self, entity: Entity) -> Result<&str, WorldError> {
        self.meta(entity).map(|row| row.name.as_str())
    }

    pub fn set_entity_name(&mut self, entity: Entity, name: &str) -> Result<(), WorldError> {
        let row = self.meta_mut(entity)?;
        row.name = if name.is_empty() { "Unnamed".to_string() } else { name.to_string() };
        Ok(())
    }

    pub fn entity_handle(&self, entity: Entity) -> Result<Handle, WorldError> {
        self.meta(entity).map(|row| row.handle)
    }

    pub fn entity_by_handle(&self, handle: Handle) -> Option<Entity> {
        self.handle_map.get(&handle).copied()
    }

    /// Static-ness is a property of the whole hierarchy and is stored on the root.
    pub fn set_static(&mut self, entity: Entity, value: bool) -> Result<(), WorldError> {
        let root = self.root(entity)?;
        self.entity_metadata[root.index() as usize].is_static = value;
        Ok(())
    }

    pub fn is_static(&self, entity: Entity) -> Result<bool, WorldError> {
        let root = self.root(entity)?;
        Ok(self.entity_metadata[root.index() as usize].is_static)
    }

    /// Enable or disable `entity` and all of its descendants.
    pub fn set_enable(&mut self, entity: Entity, value: bool) -> Result<(), WorldError> {
        let descendants = self.descendants(entity)?;
        self.apply_enabled(entity, value);
        for descendant in descendants {
            self.apply_enabled(descendant, value);
        }
        Ok(())
    }

    /// Enable or disable `entity` only.
    pub fn set_enable_single(&mut self, entity: Entity, value: bool) -> Result<(), WorldError> {
        self.meta(entity)?;
        self.apply_enabled(entity, value);
        Ok(())
    }

    pub fn is_enabled(&self, entity: Entity) -> Result<bool, WorldError> {
        self.meta(entity).map(|row| row.enabled)
    }

    pub fn entity_archetype(&self, entity: Entity) -> Result<EntityArchetype, WorldError> {
        self.meta(entity).map(|row| row.archetype)
    }

    /// Every live entity in index order.
    pub fn all_entities(&self) -> Vec<Entity> {
        let mut out = Vec::with_capacity(self.entity_count());
        self.for_all_entities(|entity| out.push(entity));
        out
    }

    pub fn for_all_entities(&self, mut f: impl FnMut(Entity)) {
        for (index, row) in self.entity_metadata.iter().enumerate() {
            if row.alive {
                f(Entity::new(index as u32, row.version));
            }
        }
    }

    pub fn entity_count(&self) -> usize {
        self.handle_map.len()
    }

    fn check_archetype(&self, archetype: EntityArchetype) -> Result<(), WorldError> {
        if (archetype.index() as usize) < self.archetypes.len() {
            Ok(())
        } else {
            tracing::warn!(%archetype, "unknown archetype");
            Err(WorldError::InvalidArchetype { archetype })
        }
    }

    /// Take a free row (or grow the table) and place the entity in `archetype`.
    pub(super) fn spawn_into(
        &mut self,
        archetype: EntityArchetype,
        name: &str,
        handle: Handle,
    ) -> Entity {
        let index = match self.free_entities.pop() {
            Some(index) => index as usize,
            None => {
                self.entity_metadata.push(EntityMetadata::vacant(1));
                self.entity_metadata.len() - 1
            }
        };
        let entity = Entity::new(index as u32, self.entity_metadata[index].version);

        let (slot, allocated) = self.storages[archetype.index() as usize].push(entity);
        if allocated {
            self.counters.increment(CHUNKS_ALLOCATED, 1);
            tracing::trace!(%archetype, "chunk allocated");
        }
        self.entity_metadata[index].occupy(name, handle, archetype, slot);
        self.handle_map.insert(handle, entity);

        self.counters.increment(ENTITIES_CREATED, 1);
        self.counters.increment(ENTITIES_ALIVE, 1);
        tracing::trace!(%entity, name, "entity created");
        entity
    }

    /// Release one entity's private components, chunk slot and row.
    /// Hierarchy links are the caller's concern.
    fn delete_entity_internal(&mut self, entity: Entity) {
        let index = entity.index() as usize;
        let mut privates = std::mem::take(&mut self.entity_metadata[index].private_components);
        for element in privates.iter_mut() {
            element.component.on_destroy(entity);
            self.private_storage.remove_owner(element.id, entity);
        }
        drop(privates);

        let row = &self.entity_metadata[index];
        let (archetype, slot, handle) = (row.archetype, row.chunk_array_index, row.handle);
        let metadata = &mut self.entity_metadata;
        self.storages[archetype.index() as usize].swap_remove(slot, |moved, new_slot| {
            metadata[moved.index() as usize].chunk_array_index = new_slot;
        });

        self.handle_map.remove(&handle);
        self.entity_metadata[index].vacate();
        if self.entity_metadata[index].is_retired() {
            tracing::debug!(index, "entity row retired, versions exhausted");
        } else {
            self.free_entities.push(index as u32);
        }

        self.counters.increment(ENTITIES_DELETED, 1);
        self.counters.decrement(ENTITIES_ALIVE, 1);
        tracing::trace!(%entity, "entity deleted");
    }

    /// Flip the enabled flag and notify enabled private components.
    pub(super) fn apply_enabled(&mut self, entity: Entity, value: bool) {
        let row = &mut self.entity_metadata[entity.index() as usize];
        if row.enabled == value {
            return;
        }
        row.enabled = value;
        for element in row.private_components.iter_mut().filter(|element| element.enabled) {
            if value {
                element.component.on_entity_enable();
            } else {
                element.component.on_entity_disable();
            }
        }
    }
}
