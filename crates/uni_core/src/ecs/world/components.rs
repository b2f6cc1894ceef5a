//! Data component access and structural changes

use super::{World, STRUCTURAL_MOVES};
use crate::ecs::archetype::EntityArchetype;
use crate::ecs::chunk::{copy_shared_components, DataComponentStorage};
use crate::ecs::component::{ComponentId, DataComponent};
use crate::ecs::entity::Entity;
use crate::ecs::error::WorldError;

/// Where one component of one entity lives.
struct Location {
    storage: usize,
    slot: usize,
    type_index: usize,
}

impl World {
    pub fn has_component_data<T: DataComponent>(&self, entity: Entity) -> Result<bool, WorldError> {
        let id = self.data_id::<T>()?;
        let archetype = self.meta(entity)?.archetype;
        Ok(self.archetypes[archetype.index() as usize].contains(id))
    }

    pub fn get_component_data<T: DataComponent>(&self, entity: Entity) -> Result<T, WorldError> {
        let at = self.locate(entity, self.data_id::<T>()?)?;
        Ok(self.storages[at.storage].read::<T>(at.slot, at.type_index))
    }

    /// Direct reference into chunk memory.
    pub fn component_data_mut<T: DataComponent>(&mut self, entity: Entity) -> Result<&mut T, WorldError> {
        let at = self.locate(entity, self.data_id::<T>()?)?;
        Ok(self.storages[at.storage].get_mut::<T>(at.slot, at.type_index))
    }

    /// Overwrite a component the entity already has.
    pub fn set_component_data<T: DataComponent>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        *self.component_data_mut::<T>(entity)? = value;
        Ok(())
    }

    /// Add `T` (moving the entity to a new archetype) and write `value`.
    /// Behaves like `set_component_data` when `T` is already present.
    pub fn add_component_data<T: DataComponent>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        let id = self.data_id::<T>()?;
        self.add_component_data_by_id(entity, id)?;
        self.set_component_data(entity, value)
    }

    pub fn remove_component_data<T: DataComponent>(&mut self, entity: Entity) -> Result<(), WorldError> {
        let id = self.data_id::<T>()?;
        self.remove_component_data_by_id(entity, id)
    }

    /// Add a zero-initialized component by id.
    pub fn add_component_data_by_id(&mut self, entity: Entity, id: ComponentId) -> Result<(), WorldError> {
        self.check_data_ids(&[id])?;
        let archetype = self.meta(entity)?.archetype;
        let info = &self.archetypes[archetype.index() as usize];
        if info.contains(id) {
            return Ok(());
        }
        let mut ids: Vec<ComponentId> = info.component_ids().collect();
        ids.push(id);
        let target = self.archetype_for_ids(None, &ids)?;
        self.move_entity(entity, target);
        Ok(())
    }

    pub fn remove_component_data_by_id(&mut self, entity: Entity, id: ComponentId) -> Result<(), WorldError> {
        self.check_data_ids(&[id])?;
        let archetype = self.meta(entity)?.archetype;
        let info = &self.archetypes[archetype.index() as usize];
        if !info.contains(id) {
            return Err(self.missing(entity, id));
        }
        let ids: Vec<ComponentId> = info.component_ids().filter(|&other| other != id).collect();
        let target = self.archetype_for_ids(None, &ids)?;
        self.move_entity(entity, target);
        Ok(())
    }

    /// Raw bytes of one component.
    pub fn component_bytes(&self, entity: Entity, id: ComponentId) -> Result<&[u8], WorldError> {
        let at = self.locate(entity, id)?;
        Ok(self.storages[at.storage].component_bytes(at.slot, at.type_index))
    }

    pub fn set_component_bytes(
        &mut self,
        entity: Entity,
        id: ComponentId,
        bytes: &[u8],
    ) -> Result<(), WorldError> {
        let at = self.locate(entity, id)?;
        let expected = self.storages[at.storage].types()[at.type_index].size;
        if expected != bytes.len() {
            return Err(WorldError::ComponentSizeMismatch {
                name: self.component_name(id),
                expected,
                found: bytes.len(),
            });
        }
        self.storages[at.storage]
            .component_bytes_mut(at.slot, at.type_index)
            .copy_from_slice(bytes);
        Ok(())
    }

    fn locate(&self, entity: Entity, id: ComponentId) -> Result<Location, WorldError> {
        let row = self.meta(entity)?;
        let storage = row.archetype.index() as usize;
        match self.storages[storage].type_index(id) {
            Some(type_index) => Ok(Location {
                storage,
                slot: row.chunk_array_index,
                type_index,
            }),
            None => Err(self.missing(entity, id)),
        }
    }

    fn missing(&self, entity: Entity, id: ComponentId) -> WorldError {
        let component = self.component_name(id);
        tracing::warn!(%entity, component = %component, "entity lacks component");
        WorldError::MissingComponent { entity, component }
    }

    /// Copy shared bytes into a zeroed slot of `target` and swap-remove the old slot.
    fn move_entity(&mut self, entity: Entity, target: EntityArchetype) {
        let index = entity.index() as usize;
        let source = self.entity_metadata[index].archetype.index() as usize;
        let source_slot = self.entity_metadata[index].chunk_array_index;
        let dest = target.index() as usize;
        if source == dest {
            return;
        }

        let (dest_slot, _) = self.storages[dest].push(entity);
        let (src, dst) = pair_mut(&mut self.storages, source, dest);
        copy_shared_components(src, source_slot, dst, dest_slot);

        let metadata = &mut self.entity_metadata;
        self.storages[source].swap_remove(source_slot, |moved, slot| {
            metadata[moved.index() as usize].chunk_array_index = slot;
        });

        let row = &mut self.entity_metadata[index];
        row.archetype = target;
        row.chunk_array_index = dest_slot;
        self.counters.increment(STRUCTURAL_MOVES, 1);
        tracing::trace!(%entity, from = source, to = dest, "entity moved between archetypes");
    }
}

/// Shared borrow of `items[a]` alongside a mutable borrow of `items[b]`; `a != b`.
fn pair_mut(
    items: &mut [DataComponentStorage],
    a: usize,
    b: usize,
) -> (&DataComponentStorage, &mut DataComponentStorage) {
    if a < b {
        let (low, high) = items.split_at_mut(b);
        (&low[a], &mut high[0])
    } else {
        let (low, high) = items.split_at_mut(a);
        (&high[0], &mut low[b])
    }
}
