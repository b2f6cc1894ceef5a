//! Archetype definitions
//!
//! An archetype is the sorted, de-duplicated set of data components shared
//! by a group of entities, plus the chunk layout derived from it. Inside a
//! chunk every component gets its own array (struct-of-arrays): component
//! `k` starts at `types[k].offset` and the element for slot `s` lives at
//! `offset + s * size`.

use std::fmt;

use super::component::{ComponentId, DataComponentType};
use super::entity::Entity;
use super::error::WorldError;

/// Index into the world's archetype table. Index 0 is the empty archetype.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityArchetype(u32);

impl EntityArchetype {
    /// The archetype with no data components.
    pub const EMPTY: EntityArchetype = EntityArchetype(0);

    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ArchetypeInfo {
    name: String,
    types: Vec<DataComponentType>,
    entity_size: usize,
    chunk_capacity: usize,
}

impl ArchetypeInfo {
    /// Build the layout for `types` inside chunks of `chunk_bytes`.
    pub(crate) fn new(
        name: &str,
        mut types: Vec<DataComponentType>,
        chunk_bytes: usize,
    ) -> Result<Self, WorldError> {
        types.sort_by_key(|ty| ty.id);
        types.dedup_by_key(|ty| ty.id);

        let entity_size: usize = types.iter().map(|ty| ty.size).sum();
        // Entity slots still cost their index entry when no component is stored.
        let stride = entity_size.max(std::mem::size_of::<Entity>());
        let mut capacity = chunk_bytes / stride;
        while capacity > 0 && Self::layout(&mut types, capacity) > chunk_bytes {
            capacity -= 1;
        }
        if capacity == 0 {
            return Err(WorldError::ArchetypeTooLarge {
                name: name.to_string(),
                entity_size,
                chunk_bytes,
            });
        }
        Self::layout(&mut types, capacity);

        Ok(Self {
            name: name.to_string(),
            types,
            entity_size,
            chunk_capacity: capacity,
        })
    }

    /// The archetype with no components; never too large for a chunk.
    pub(crate) fn empty(chunk_bytes: usize) -> Self {
        Self {
            name: "Empty".to_string(),
            types: Vec::new(),
            entity_size: 0,
            chunk_capacity: (chunk_bytes / std::mem::size_of::<Entity>()).max(1),
        }
    }

    /// Assign array offsets for `capacity` slots, returning the bytes used.
    fn layout(types: &mut [DataComponentType], capacity: usize) -> usize {
        let mut cursor: usize = 0;
        for ty in types.iter_mut() {
            cursor = cursor.next_multiple_of(ty.align);
            ty.offset = cursor;
            cursor += ty.size * capacity;
        }
        cursor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component descriptors, sorted by id.
    pub fn types(&self) -> &[DataComponentType] {
        &self.types
    }

    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.types.iter().map(|ty| ty.id)
    }

    /// Sum of component sizes for one entity.
    pub fn entity_size(&self) -> usize {
        self.entity_size
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub fn type_index(&self, id: ComponentId) -> Option<usize> {
        self.types.binary_search_by_key(&id, |ty| ty.id).ok()
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.type_index(id).is_some()
    }
}
