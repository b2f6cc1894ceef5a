// query.rs - Cached archetype filters and chunk views
//
// A query holds three component sets. Archetypes are only ever appended,
// so each query remembers how many it has already tested and only checks
// newcomers on refresh.

use std::collections::VecDeque;
use std::fmt;

use super::archetype::{ArchetypeInfo, EntityArchetype};
use super::component::{ComponentId, ComponentTuple};
use super::entity::Entity;
use super::error::WorldError;

/// Pooled query handle. Index 0 is the null query.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EntityQuery(u32);

impl EntityQuery {
    pub const NULL: EntityQuery = EntityQuery(0);

    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which filter set a call replaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryFilterKind {
    /// Every listed component must be present.
    All,
    /// At least one listed component must be present, unless the set is empty.
    Any,
    /// No listed component may be present.
    None,
}

/// Iteration switches for [`World::for_each_with`](super::World::for_each_with).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ForEachOptions {
    /// Split work across the world's worker pool, one chunk per task.
    pub parallel: bool,
    /// Skip entities whose enabled flag is off.
    pub check_enabled: bool,
}

impl Default for ForEachOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            check_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct QueryFilter {
    all: Vec<ComponentId>,
    any: Vec<ComponentId>,
    none: Vec<ComponentId>,
}

impl QueryFilter {
    pub fn set(&mut self, kind: QueryFilterKind, mut ids: Vec<ComponentId>) {
        ids.sort_unstable();
        ids.dedup();
        match kind {
            QueryFilterKind::All => self.all = ids,
            QueryFilterKind::Any => self.any = ids,
            QueryFilterKind::None => self.none = ids,
        }
    }

    pub fn matches(&self, archetype: &ArchetypeInfo) -> bool {
        self.all.iter().all(|&id| archetype.contains(id))
            && (self.any.is_empty() || self.any.iter().any(|&id| archetype.contains(id)))
            && !self.none.iter().any(|&id| archetype.contains(id))
    }
}

#[derive(Debug, Default)]
pub(crate) struct QueryRecord {
    pub filter: QueryFilter,
    matched: Vec<EntityArchetype>,
    checked: usize,
    alive: bool,
}

impl QueryRecord {
    fn reset(&mut self) {
        self.matched.clear();
        self.checked = 0;
    }
}

/// Query table with a FIFO free list of released slots.
#[derive(Debug)]
pub(crate) struct QueryPool {
    records: Vec<QueryRecord>,
    free: VecDeque<u32>,
}

impl Default for QueryPool {
    fn default() -> Self {
        Self {
            records: vec![QueryRecord::default()],
            free: VecDeque::new(),
        }
    }
}

impl QueryPool {
    pub fn create(&mut self) -> EntityQuery {
        let index = match self.free.pop_front() {
            Some(index) => index,
            None => {
                self.records.push(QueryRecord::default());
                (self.records.len() - 1) as u32
            }
        };
        let record = &mut self.records[index as usize];
        record.filter = QueryFilter::default();
        record.reset();
        record.alive = true;
        EntityQuery(index)
    }

    pub fn release(&mut self, query: EntityQuery) -> Result<(), WorldError> {
        let record = self.get_mut(query)?;
        record.alive = false;
        record.filter = QueryFilter::default();
        record.reset();
        self.free.push_back(query.0);
        Ok(())
    }

    #[cfg(test)]
    pub fn get(&self, query: EntityQuery) -> Result<&QueryRecord, WorldError> {
        self.records
            .get(query.0 as usize)
            .filter(|record| record.alive && !query.is_null())
            .ok_or(WorldError::InvalidQuery { query })
    }

    pub fn get_mut(&mut self, query: EntityQuery) -> Result<&mut QueryRecord, WorldError> {
        self.records
            .get_mut(query.0 as usize)
            .filter(|record| record.alive && !query.is_null())
            .ok_or(WorldError::InvalidQuery { query })
    }

    pub fn set_filter(
        &mut self,
        query: EntityQuery,
        kind: QueryFilterKind,
        ids: Vec<ComponentId>,
    ) -> Result<(), WorldError> {
        let record = self.get_mut(query)?;
        record.filter.set(kind, ids);
        record.reset();
        Ok(())
    }

    /// Test archetypes created since the last refresh and return all matches.
    pub fn refresh(
        &mut self,
        query: EntityQuery,
        archetypes: &[ArchetypeInfo],
    ) -> Result<&[EntityArchetype], WorldError> {
        let record = self.get_mut(query)?;
        for (index, info) in archetypes.iter().enumerate().skip(record.checked) {
            if record.filter.matches(info) {
                record.matched.push(EntityArchetype::new(index as u32));
            }
        }
        record.checked = archetypes.len();
        Ok(&record.matched)
    }

    pub fn live_count(&self) -> usize {
        self.records.iter().filter(|record| record.alive).count()
    }
}

/// Raw view of one chunk for typed iteration.
pub(crate) struct ChunkView<'w> {
    pub entities: &'w [Entity],
    /// Running iteration index of the chunk's first slot.
    pub base_index: usize,
    pub columns: Vec<*mut u8>,
}

// SAFETY: each view covers a distinct chunk, and the world stays exclusively
// borrowed while views exist, so no two threads touch the same bytes.
unsafe impl Send for ChunkView<'_> {}
unsafe impl Sync for ChunkView<'_> {}

impl<'w> ChunkView<'w> {
    /// Invoke `f` for each occupied slot in ascending order.
    ///
    /// # Safety
    /// `columns` must match `Q`'s types and no other reference to this
    /// chunk's component bytes may be live for `'w`.
    pub unsafe fn run<Q, F, E>(&self, enabled: &E, f: &F)
    where
        Q: ComponentTuple,
        F: Fn(usize, Entity, Q::Refs<'w>),
        E: Fn(Entity) -> bool,
    {
        for (row, &entity) in self.entities.iter().enumerate() {
            if !enabled(entity) {
                continue;
            }
            let refs: Q::Refs<'w> = Q::fetch(&self.columns, row);
            f(self.base_index + row, entity, refs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::DataComponentType;

    fn archetype(ids: &[u32]) -> ArchetypeInfo {
        let types = ids
            .iter()
            .map(|&id| DataComponentType {
                name: format!("C{id}"),
                id: ComponentId::new(id),
                size: 4,
                align: 4,
                offset: 0,
            })
            .collect();
        ArchetypeInfo::new("test", types, 16384).unwrap()
    }

    fn ids(raw: &[u32]) -> Vec<ComponentId> {
        raw.iter().map(|&id| ComponentId::new(id)).collect()
    }

    #[test]
    fn filter_semantics() {
        let mut filter = QueryFilter::default();
        filter.set(QueryFilterKind::All, ids(&[0, 1]));
        filter.set(QueryFilterKind::None, ids(&[2]));
        assert!(filter.matches(&archetype(&[0, 1])));
        assert!(filter.matches(&archetype(&[0, 1, 3])));
        assert!(!filter.matches(&archetype(&[0, 1, 2])));
        assert!(!filter.matches(&archetype(&[0])));

        filter.set(QueryFilterKind::Any, ids(&[3, 4]));
        assert!(!filter.matches(&archetype(&[0, 1])));
        assert!(filter.matches(&archetype(&[0, 1, 4])));
    }

    #[test]
    fn released_slots_are_reused_first_in_first_out() {
        let mut pool = QueryPool::default();
        let a = pool.create();
        let b = pool.create();
        assert_eq!((a.index(), b.index()), (1, 2));
        pool.release(b).unwrap();
        pool.release(a).unwrap();
        assert!(pool.get(a).is_err());
        assert!(pool.release(a).is_err());
        assert_eq!(pool.create(), b);
        assert_eq!(pool.create(), a);
        assert!(pool.get(EntityQuery::NULL).is_err());
        assert_eq!(pool.live_count(), 2);
    }

    #[test]
    fn refresh_only_checks_new_archetypes() {
        let mut pool = QueryPool::default();
        let q = pool.create();
        pool.set_filter(q, QueryFilterKind::All, ids(&[0])).unwrap();
        let mut archetypes = vec![archetype(&[]), archetype(&[0])];
        assert_eq!(pool.refresh(q, &archetypes).unwrap().len(), 1);

        archetypes.push(archetype(&[0, 1]));
        archetypes.push(archetype(&[1]));
        let matched = pool.refresh(q, &archetypes).unwrap().to_vec();
        assert_eq!(matched, vec![EntityArchetype::new(1), EntityArchetype::new(2)]);

        pool.set_filter(q, QueryFilterKind::None, ids(&[1])).unwrap();
        assert_eq!(pool.refresh(q, &archetypes).unwrap(), &[EntityArchetype::new(1)]);
    }
}
