//! Query filters and typed iteration

use rayon::prelude::*;

use super::World;
use crate::ecs::archetype::EntityArchetype;
use crate::ecs::chunk::DataComponentStorage;
use crate::ecs::component::{ComponentId, ComponentTuple, DataComponent};
use crate::ecs::entity::Entity;
use crate::ecs::error::WorldError;
use crate::ecs::metadata::EntityMetadata;
use crate::ecs::query::{ChunkView, EntityQuery, ForEachOptions, QueryFilterKind};

impl World {
    pub fn create_entity_query(&mut self) -> EntityQuery {
        let query = self.queries.create();
        tracing::trace!(%query, "query created");
        query
    }

    pub fn release_entity_query(&mut self, query: EntityQuery) -> Result<(), WorldError> {
        self.queries.release(query).map_err(|err| {
            tracing::warn!(%query, "release of unknown query");
            err
        })
    }

    /// Queries currently handed out.
    pub fn entity_query_count(&self) -> usize {
        self.queries.live_count()
    }

    /// Require every component in `Q`.
    pub fn set_query_all_filters<Q: ComponentTuple>(&mut self, query: EntityQuery) -> Result<(), WorldError> {
        let ids = self.resolve_tuple::<Q>()?;
        self.set_query_filters_by_ids(query, QueryFilterKind::All, &ids)
    }

    /// Require at least one component in `Q`.
    pub fn set_query_any_filters<Q: ComponentTuple>(&mut self, query: EntityQuery) -> Result<(), WorldError> {
        let ids = self.resolve_tuple::<Q>()?;
        self.set_query_filters_by_ids(query, QueryFilterKind::Any, &ids)
    }

    /// Exclude every component in `Q`.
    pub fn set_query_none_filters<Q: ComponentTuple>(&mut self, query: EntityQuery) -> Result<(), WorldError> {
        let ids = self.resolve_tuple::<Q>()?;
        self.set_query_filters_by_ids(query, QueryFilterKind::None, &ids)
    }

    /// Replace one filter set. The query's archetype cache starts over.
    pub fn set_query_filters_by_ids(
        &mut self,
        query: EntityQuery,
        kind: QueryFilterKind,
        ids: &[ComponentId],
    ) -> Result<(), WorldError> {
        self.check_data_ids(ids)?;
        self.queries.set_filter(query, kind, ids.to_vec())
    }

    /// Archetypes currently matching `query`, in creation order.
    pub fn matching_archetypes(&mut self, query: EntityQuery) -> Result<Vec<EntityArchetype>, WorldError> {
        self.queries
            .refresh(query, &self.archetypes)
            .map(<[EntityArchetype]>::to_vec)
    }

    /// Run `f` on every enabled entity the query matches.
    ///
    /// `f` receives the running iteration index, the entity and mutable
    /// references to its `Q` components. Matching archetypes that lack one
    /// of `Q`'s components are skipped.
    pub fn for_each<'w, Q, F>(&'w mut self, query: EntityQuery, parallel: bool, f: F) -> Result<(), WorldError>
    where
        Q: ComponentTuple,
        F: Fn(usize, Entity, Q::Refs<'w>) + Send + Sync,
    {
        self.for_each_with::<Q, F>(
            query,
            ForEachOptions {
                parallel,
                check_enabled: true,
            },
            f,
        )
    }

    pub fn for_each_with<'w, Q, F>(
        &'w mut self,
        query: EntityQuery,
        options: ForEachOptions,
        f: F,
    ) -> Result<(), WorldError>
    where
        Q: ComponentTuple,
        F: Fn(usize, Entity, Q::Refs<'w>) + Send + Sync,
    {
        let ids = self.resolve_tuple::<Q>()?;
        for (position, id) in ids.iter().enumerate() {
            if ids[..position].contains(id) {
                let component = self.component_name(*id);
                tracing::warn!(component = %component, "component requested twice in one iteration");
                return Err(WorldError::AliasedComponent { component });
            }
        }
        let matched = self.matching_archetypes(query)?;

        let World {
            storages,
            entity_metadata,
            pool,
            ..
        } = self;

        // Column pointers need the storages mutably; entity slices only need
        // them shared, so gather pointers first.
        let mut plans = Vec::new();
        for archetype in matched {
            let storage = &mut storages[archetype.index() as usize];
            let Some(indices) = ids
                .iter()
                .map(|&id| storage.type_index(id))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            for chunk in 0..storage.chunk_count() {
                let columns: Vec<*mut u8> = indices
                    .iter()
                    .map(|&index| storage.column_ptr(chunk, index))
                    .collect();
                plans.push((archetype, chunk, columns));
            }
        }

        let storages: &'w [DataComponentStorage] = storages;
        let metadata: &'w [EntityMetadata] = entity_metadata;
        let mut base_index = 0;
        let views: Vec<ChunkView<'w>> = plans
            .into_iter()
            .map(|(archetype, chunk, columns)| {
                let storage = &storages[archetype.index() as usize];
                let start = chunk * storage.chunk_capacity();
                let entities = &storage.entities()[start..start + storage.chunk_len(chunk)];
                let view = ChunkView {
                    entities,
                    base_index,
                    columns,
                };
                base_index += entities.len();
                view
            })
            .collect();

        let check_enabled = options.check_enabled;
        let enabled = |entity: Entity| !check_enabled || metadata[entity.index() as usize].enabled;

        if options.parallel {
            // SAFETY: every view covers a distinct chunk and the world is
            // exclusively borrowed for 'w.
            let run = || {
                views
                    .par_iter()
                    .for_each(|view| unsafe { view.run::<Q, F, _>(&enabled, &f) })
            };
            match pool.as_ref() {
                Some(pool) => pool.install(run),
                None => run(),
            }
        } else {
            for view in &views {
                // SAFETY: as above, one view at a time.
                unsafe { view.run::<Q, F, _>(&enabled, &f) };
            }
        }
        Ok(())
    }

    /// Copy of every matching entity's `T`, chunk then slot order.
    pub fn component_data_array<T: DataComponent>(
        &mut self,
        query: EntityQuery,
        check_enabled: bool,
    ) -> Result<Vec<T>, WorldError> {
        let ids = [self.data_id::<T>()?];
        let mut values = Vec::new();
        self.visit_slots(query, check_enabled, &ids, |storage, slot, indices| {
            values.push(storage.read::<T>(slot, indices[0]));
        })?;
        Ok(values)
    }

    /// Like [`component_data_array`](Self::component_data_array), keeping
    /// only entities whose `K` passes `filter`.
    pub fn component_data_array_filtered<K, T, P>(
        &mut self,
        query: EntityQuery,
        check_enabled: bool,
        filter: P,
    ) -> Result<Vec<T>, WorldError>
    where
        K: DataComponent,
        T: DataComponent,
        P: Fn(&K) -> bool,
    {
        let ids = [self.data_id::<K>()?, self.data_id::<T>()?];
        let mut values = Vec::new();
        self.visit_slots(query, check_enabled, &ids, |storage, slot, indices| {
            if filter(&storage.read::<K>(slot, indices[0])) {
                values.push(storage.read::<T>(slot, indices[1]));
            }
        })?;
        Ok(values)
    }

    /// Entities the query matches, optionally only the enabled ones.
    pub fn entity_array(&mut self, query: EntityQuery, check_enabled: bool) -> Result<Vec<Entity>, WorldError> {
        let mut entities = Vec::new();
        self.visit_slots(query, check_enabled, &[], |storage, slot, _| {
            entities.push(storage.entities()[slot]);
        })?;
        Ok(entities)
    }

    /// Matching entities whose `K` passes `filter`.
    pub fn entity_array_filtered<K, P>(
        &mut self,
        query: EntityQuery,
        check_enabled: bool,
        filter: P,
    ) -> Result<Vec<Entity>, WorldError>
    where
        K: DataComponent,
        P: Fn(&K) -> bool,
    {
        let ids = [self.data_id::<K>()?];
        let mut entities = Vec::new();
        self.visit_slots(query, check_enabled, &ids, |storage, slot, indices| {
            if filter(&storage.read::<K>(slot, indices[0])) {
                entities.push(storage.entities()[slot]);
            }
        })?;
        Ok(entities)
    }

    pub fn entity_amount(&mut self, query: EntityQuery, check_enabled: bool) -> Result<usize, WorldError> {
        let matched = self.matching_archetypes(query)?;
        Ok(matched
            .into_iter()
            .map(|archetype| {
                let entities = self.storages[archetype.index() as usize].entities();
                if check_enabled {
                    entities
                        .iter()
                        .filter(|entity| self.entity_metadata[entity.index() as usize].enabled)
                        .count()
                } else {
                    entities.len()
                }
            })
            .sum())
    }

    /// Call `f` with each matching slot and the column indices of `ids`.
    /// Archetypes lacking any of `ids` are skipped.
    fn visit_slots(
        &mut self,
        query: EntityQuery,
        check_enabled: bool,
        ids: &[ComponentId],
        mut f: impl FnMut(&DataComponentStorage, usize, &[usize]),
    ) -> Result<(), WorldError> {
        let matched = self.matching_archetypes(query)?;
        for archetype in matched {
            let storage = &self.storages[archetype.index() as usize];
            let Some(indices) = ids
                .iter()
                .map(|&id| storage.type_index(id))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            for (slot, entity) in storage.entities().iter().enumerate() {
                if check_enabled && !self.entity_metadata[entity.index() as usize].enabled {
                    continue;
                }
                f(storage, slot, &indices);
            }
        }
        Ok(())
    }
}
