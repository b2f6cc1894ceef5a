//! Per-entity bookkeeping

use super::archetype::EntityArchetype;
use super::component::ComponentId;
use super::entity::Entity;
use super::handle::Handle;
use super::private_component::PrivateComponentElement;

/// One row of the entity table, indexed by `Entity::index`.
///
/// Rows are never removed. A deleted row keeps its bumped version and waits
/// on the free list, unless its versions are used up: a row that reaches
/// `u32::MAX` is retired and never handed out again.
pub(crate) struct EntityMetadata {
    pub name: String,
    pub handle: Handle,
    pub version: u32,
    pub is_static: bool,
    pub enabled: bool,
    pub alive: bool,
    pub parent: Entity,
    pub children: Vec<Entity>,
    pub archetype: EntityArchetype,
    pub chunk_array_index: usize,
    pub private_components: Vec<PrivateComponentElement>,
}

impl EntityMetadata {
    /// A free row whose next occupant gets `version`.
    pub fn vacant(version: u32) -> Self {
        Self {
            name: String::new(),
            handle: Handle::NULL,
            version,
            is_static: false,
            enabled: false,
            alive: false,
            parent: Entity::NULL,
            children: Vec::new(),
            archetype: EntityArchetype::EMPTY,
            chunk_array_index: 0,
            private_components: Vec::new(),
        }
    }

    pub fn occupy(&mut self, name: &str, handle: Handle, archetype: EntityArchetype, slot: usize) {
        self.name = if name.is_empty() { "Unnamed".to_string() } else { name.to_string() };
        self.handle = handle;
        self.is_static = false;
        self.enabled = true;
        self.alive = true;
        self.parent = Entity::NULL;
        self.children.clear();
        self.archetype = archetype;
        self.chunk_array_index = slot;
    }

    /// Mark the row free and invalidate every outstanding handle to it.
    pub fn vacate(&mut self) {
        self.alive = false;
        self.enabled = false;
        self.version = self.version.saturating_add(1);
        self.name.clear();
        self.handle = Handle::NULL;
        self.parent = Entity::NULL;
        self.children.clear();
        self.private_components.clear();
    }

    /// No version is left for another occupant.
    pub fn is_retired(&self) -> bool {
        self.version == u32::MAX
    }

    pub fn private_index(&self, id: ComponentId) -> Option<usize> {
        self.private_components.iter().position(|element| element.id == id)
    }
}
