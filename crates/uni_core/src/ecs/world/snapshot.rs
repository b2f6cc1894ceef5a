//! World snapshot and restore
//!
//! A snapshot names components by their registered names and links the
//! hierarchy by persistent handle, so it can be restored into any world
//! that registered the same components.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::World;
use crate::ecs::component::ComponentId;
use crate::ecs::entity::Entity;
use crate::ecs::error::WorldError;
use crate::ecs::handle::Handle;
use crate::ecs::private_component::PrivateComponent;
use crate::ecs::registry::RegistryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataComponentBlob {
    pub type_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateComponentBlob {
    pub type_name: String,
    pub enabled: bool,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub name: String,
    pub handle: Handle,
    /// Version the entity had when captured. Restored entities get fresh versions.
    pub version: u32,
    pub is_static: bool,
    pub enabled: bool,
    pub parent: Handle,
    pub children: Vec<Handle>,
    pub data_components: Vec<DataComponentBlob>,
    pub private_components: Vec<PrivateComponentBlob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub entities: Vec<EntitySnapshot>,
}

impl WorldSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Everything needed to rebuild one entity, checked before the world is touched.
struct PreparedEntity<'s> {
    source: &'s EntitySnapshot,
    ids: Vec<ComponentId>,
    privates: Vec<(ComponentId, bool, Box<dyn PrivateComponent>)>,
}

impl World {
    /// Capture every live entity in index order.
    pub fn snapshot(&self) -> WorldSnapshot {
        let handle_of = |entity: Entity| {
            if entity.is_null() {
                Handle::NULL
            } else {
                self.entity_metadata[entity.index() as usize].handle
            }
        };

        let entities = self
            .entity_metadata
            .iter()
            .filter(|row| row.alive)
            .map(|row| {
                let storage = &self.storages[row.archetype.index() as usize];
                let data_components = storage
                    .types()
                    .iter()
                    .enumerate()
                    .map(|(index, ty)| DataComponentBlob {
                        type_name: ty.name.clone(),
                        bytes: storage.component_bytes(row.chunk_array_index, index).to_vec(),
                    })
                    .collect();
                let private_components = row
                    .private_components
                    .iter()
                    .map(|element| PrivateComponentBlob {
                        type_name: self.component_name(element.id),
                        enabled: element.enabled,
                        payload: element.component.serialize(),
                    })
                    .collect();
                EntitySnapshot {
                    name: row.name.clone(),
                    handle: row.handle,
                    version: row.version,
                    is_static: row.is_static,
                    enabled: row.enabled,
                    parent: handle_of(row.parent),
                    children: row.children.iter().map(|&child| handle_of(child)).collect(),
                    data_components,
                    private_components,
                }
            })
            .collect();
        WorldSnapshot { entities }
    }

    /// Replace the world's entities with the ones in `snapshot`.
    ///
    /// The snapshot is validated in full first; on error the world keeps its
    /// current entities. Returns the new entities in snapshot order.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) -> Result<Vec<Entity>, WorldError> {
        let prepared = self.prepare_restore(snapshot)?;
        let links = snapshot_links(snapshot)?;
        let archetypes = prepared
            .iter()
            .map(|entry| self.archetype_for_ids(None, &entry.ids))
            .collect::<Result<Vec<_>, _>>()?;

        self.purge();

        let mut restored = Vec::with_capacity(prepared.len());
        for (entry, archetype) in prepared.into_iter().zip(archetypes) {
            let source = entry.source;
            let handle = if source.handle.is_null() { Handle::new() } else { source.handle };
            let entity = self.spawn_into(archetype, &source.name, handle);
            let index = entity.index() as usize;
            let slot = self.entity_metadata[index].chunk_array_index;

            let storage = &mut self.storages[archetype.index() as usize];
            for (blob, id) in source.data_components.iter().zip(&entry.ids) {
                if let Some(type_index) = storage.type_index(*id) {
                    storage
                        .component_bytes_mut(slot, type_index)
                        .copy_from_slice(&blob.bytes);
                }
            }

            self.entity_metadata[index].is_static = source.is_static;
            for (id, enabled, component) in entry.privates {
                self.attach_private(entity, id, component, enabled);
            }
            if !source.enabled {
                self.apply_enabled(entity, false);
            }

            restored.push(entity);
        }

        for (parent, child) in links {
            self.link_child(restored[child], restored[parent]);
        }

        tracing::debug!(world = %self.name, entities = restored.len(), "world restored");
        Ok(restored)
    }

    fn prepare_restore<'s>(&self, snapshot: &'s WorldSnapshot) -> Result<Vec<PreparedEntity<'s>>, WorldError> {
        let mut handles = HashSet::with_capacity(snapshot.entities.len());
        snapshot
            .entities
            .iter()
            .map(|source| {
                if !source.handle.is_null() && !handles.insert(source.handle) {
                    tracing::warn!(handle = %source.handle, "duplicate handle in snapshot");
                    return Err(WorldError::DuplicateHandle {
                        handle: source.handle,
                    });
                }

                let ids = source
                    .data_components
                    .iter()
                    .map(|blob| self.data_blob_id(blob))
                    .collect::<Result<Vec<_>, _>>()?;
                let privates = source
                    .private_components
                    .iter()
                    .map(|blob| self.private_blob(blob))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PreparedEntity { source, ids, privates })
            })
            .collect()
    }

    fn data_blob_id(&self, blob: &DataComponentBlob) -> Result<ComponentId, WorldError> {
        let id = self.component_id_by_name(&blob.type_name)?;
        let ty = self.registry.data_type(id).ok_or_else(|| {
            tracing::warn!(component = %blob.type_name, "snapshot lists a private component as data");
            RegistryError::KindMismatch {
                name: blob.type_name.clone(),
                expected: "data",
            }
        })?;
        if ty.size != blob.bytes.len() {
            tracing::warn!(
                component = %blob.type_name,
                expected = ty.size,
                found = blob.bytes.len(),
                "snapshot component size mismatch"
            );
            return Err(WorldError::ComponentSizeMismatch {
                name: blob.type_name.clone(),
                expected: ty.size,
                found: blob.bytes.len(),
            });
        }
        Ok(id)
    }

    fn private_blob(
        &self,
        blob: &PrivateComponentBlob,
    ) -> Result<(ComponentId, bool, Box<dyn PrivateComponent>), WorldError> {
        let id = self.component_id_by_name(&blob.type_name)?;
        let ty = self.registry.private_type(id).ok_or_else(|| {
            tracing::warn!(component = %blob.type_name, "snapshot lists a data component as private");
            RegistryError::KindMismatch {
                name: blob.type_name.clone(),
                expected: "private",
            }
        })?;
        let mut component = ty.instantiate();
        component.deserialize(&blob.payload).map_err(|source| {
            tracing::warn!(component = %blob.type_name, err = %source, "private component payload rejected");
            WorldError::PrivateComponentPayload {
                name: blob.type_name.clone(),
                source,
            }
        })?;
        Ok((id, blob.enabled, component))
    }

    fn component_id_by_name(&self, name: &str) -> Result<ComponentId, WorldError> {
        self.registry.id_by_name(name).ok_or_else(|| {
            tracing::warn!(component = name, "unknown component name in snapshot");
            WorldError::UnknownComponentName {
                name: name.to_string(),
            }
        })
    }
}

/// Resolve every child link of `snapshot` to `(parent, child)` entry indices.
///
/// Each child must name another entry of the snapshot, have at most one
/// parent and never be its own ancestor.
fn snapshot_links(snapshot: &WorldSnapshot) -> Result<Vec<(usize, usize)>, WorldError> {
    let broken = |handle: Handle, reason: &'static str| {
        tracing::warn!(%handle, reason, "snapshot hierarchy rejected");
        WorldError::SnapshotHierarchy { handle, reason }
    };

    let by_handle: HashMap<Handle, usize> = snapshot
        .entities
        .iter()
        .enumerate()
        .filter(|(_, source)| !source.handle.is_null())
        .map(|(index, source)| (source.handle, index))
        .collect();

    let mut parent_of: Vec<Option<usize>> = vec![None; snapshot.entities.len()];
    let mut links = Vec::new();
    for (parent, source) in snapshot.entities.iter().enumerate() {
        for child_handle in &source.children {
            let &child = by_handle
                .get(child_handle)
                .ok_or_else(|| broken(source.handle, "child handle not in snapshot"))?;
            if child == parent {
                return Err(broken(source.handle, "entity lists itself as a child"));
            }
            if parent_of[child].is_some() {
                return Err(broken(*child_handle, "entity listed as a child more than once"));
            }
            parent_of[child] = Some(parent);
            links.push((parent, child));
        }
    }

    // With one parent per entry, a cycle is an ancestor walk that returns
    // to an entry already on the current path.
    let mut acyclic = vec![false; parent_of.len()];
    let mut walked_from = vec![usize::MAX; parent_of.len()];
    for start in 0..parent_of.len() {
        let mut path = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            if acyclic[index] {
                break;
            }
            if walked_from[index] == start {
                return Err(broken(snapshot.entities[index].handle, "hierarchy contains a cycle"));
            }
            walked_from[index] = start;
            path.push(index);
            current = parent_of[index];
        }
        for index in path {
            acyclic[index] = true;
        }
    }
    Ok(links)
}
