// private_component.rs - Polymorphic per-entity components
//
// Private components are heap objects owned by a single entity's metadata.
// The storage below only indexes owners per type so "all owners of T" is a
// slice lookup.

use std::collections::HashMap;

use super::component::{AsAny, ComponentId};
use super::entity::Entity;
use crate::time::WorldTime;

/// A heap-allocated component with lifecycle hooks.
///
/// Register with [`World::register_private_component`](super::World::register_private_component).
pub trait PrivateComponent: AsAny + Send + Sync {
    /// Called after the component is attached to `owner`.
    fn on_create(&mut self, _owner: Entity) {}

    /// Called before the component is dropped, including when `owner` is deleted.
    fn on_destroy(&mut self, _owner: Entity) {}

    fn on_enable(&mut self) {}

    fn on_disable(&mut self) {}

    /// The owning entity became enabled.
    fn on_entity_enable(&mut self) {}

    /// The owning entity became disabled.
    fn on_entity_disable(&mut self) {}

    /// Runs once, at the first frame where both the component and its owner
    /// are enabled. The per-frame hooks only run after it.
    fn start(&mut self, _owner: Entity) {}

    fn fixed_update(&mut self, _owner: Entity, _time: &WorldTime) {}

    fn update(&mut self, _owner: Entity, _time: &WorldTime) {}

    fn late_update(&mut self, _owner: Entity, _time: &WorldTime) {}

    fn serialize(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn deserialize(&mut self, _value: &serde_json::Value) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

/// Registry entry for a private component type.
#[derive(Clone)]
pub struct PrivateComponentType {
    pub name: String,
    pub id: ComponentId,
    pub(crate) factory: fn() -> Box<dyn PrivateComponent>,
}

impl PrivateComponentType {
    /// Default-construct a new instance.
    pub fn instantiate(&self) -> Box<dyn PrivateComponent> {
        (self.factory)()
    }
}

impl std::fmt::Debug for PrivateComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateComponentType")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

/// One private component attached to an entity.
pub(crate) struct PrivateComponentElement {
    pub id: ComponentId,
    pub enabled: bool,
    pub started: bool,
    pub component: Box<dyn PrivateComponent>,
}

impl PrivateComponentElement {
    pub fn downcast_ref<T: PrivateComponent>(&self) -> Option<&T> {
        let component: &dyn PrivateComponent = &*self.component;
        component.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: PrivateComponent>(&mut self) -> Option<&mut T> {
        let component: &mut dyn PrivateComponent = &mut *self.component;
        component.as_any_mut().downcast_mut::<T>()
    }
}

/// Owners of one private component type.
///
/// `owners_map[e] == i` holds exactly when `owners_list[i] == e`.
#[derive(Debug, Default)]
pub(crate) struct POwnersCollection {
    owners_map: HashMap<Entity, usize>,
    owners_list: Vec<Entity>,
}

impl POwnersCollection {
    /// Returns false if `owner` was already present.
    pub fn insert(&mut self, owner: Entity) -> bool {
        if self.owners_map.contains_key(&owner) {
            return false;
        }
        self.owners_map.insert(owner, self.owners_list.len());
        self.owners_list.push(owner);
        true
    }

    /// Swap the last owner into the vacated position and pop.
    pub fn remove(&mut self, owner: Entity) -> bool {
        let Some(index) = self.owners_map.remove(&owner) else {
            return false;
        };
        self.owners_list.swap_remove(index);
        if let Some(&moved) = self.owners_list.get(index) {
            self.owners_map.insert(moved, index);
        }
        true
    }

    pub fn owners(&self) -> &[Entity] {
        &self.owners_list
    }

    pub fn contains(&self, owner: Entity) -> bool {
        self.owners_map.contains_key(&owner)
    }

    pub fn is_empty(&self) -> bool {
        self.owners_list.is_empty()
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.owners_map.len() == self.owners_list.len()
            && self
                .owners_list
                .iter()
                .enumerate()
                .all(|(i, e)| self.owners_map.get(e) == Some(&i))
    }
}

/// Per-type owner index for every private component in a world.
#[derive(Debug, Default)]
pub(crate) struct PrivateComponentStorage {
    collections: HashMap<ComponentId, POwnersCollection>,
}

impl PrivateComponentStorage {
    pub fn set_owner(&mut self, id: ComponentId, owner: Entity) {
        self.collections.entry(id).or_default().insert(owner);
    }

    pub fn remove_owner(&mut self, id: ComponentId, owner: Entity) {
        if let Some(collection) = self.collections.get_mut(&id) {
            collection.remove(owner);
            if collection.is_empty() {
                self.collections.remove(&id);
            }
        }
    }

    pub fn owners(&self, id: ComponentId) -> &[Entity] {
        self.collections
            .get(&id)
            .map(POwnersCollection::owners)
            .unwrap_or(&[])
    }

    pub fn is_owner(&self, id: ComponentId, owner: Entity) -> bool {
        self.collections
            .get(&id)
            .is_some_and(|collection| collection.contains(owner))
    }

    pub fn clear(&mut self) {
        self.collections.clear();
    }
}
