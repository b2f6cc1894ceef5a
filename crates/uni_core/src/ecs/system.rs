// system.rs - System trait, ordering and registration
//
// Systems live in one of three groups and are run in (group, rank,
// registration) order. The world detaches the whole list while a phase
// runs so every system can receive `&mut World`.

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use super::component::AsAny;
use super::error::WorldError;
use super::world::World;

pub type SystemResult = Result<(), WorldError>;

/// Per-frame logic driven by [`World::update`].
///
/// Every hook defaults to a no-op. An `Err` is logged by the world and the
/// frame carries on with the next system.
pub trait System: AsAny + Send {
    fn on_create(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    /// Runs once, at the start of the first frame the system is enabled for.
    fn start(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    fn on_enable(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    fn on_disable(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    fn on_destroy(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    fn pre_update(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    fn fixed_update(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    fn update(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    fn late_update(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SystemGroup {
    Preparation,
    Simulation,
    Presentation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SystemPhase {
    Start,
    PreUpdate,
    FixedUpdate,
    Update,
    LateUpdate,
}

impl SystemPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SystemPhase::Start => "start",
            SystemPhase::PreUpdate => "pre_update",
            SystemPhase::FixedUpdate => "fixed_update",
            SystemPhase::Update => "update",
            SystemPhase::LateUpdate => "late_update",
        }
    }

    pub(crate) fn run(self, system: &mut dyn System, world: &mut World) -> SystemResult {
        match self {
            SystemPhase::Start => system.start(world),
            SystemPhase::PreUpdate => system.pre_update(world),
            SystemPhase::FixedUpdate => system.fixed_update(world),
            SystemPhase::Update => system.update(world),
            SystemPhase::LateUpdate => system.late_update(world),
        }
    }
}

impl fmt::Display for SystemPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle assigned to each registered system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemHandle(u32);

impl SystemHandle {
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while registering a system with the world.
#[derive(Debug, Error)]
pub enum SystemRegistrationError {
    #[error("system name '{name}' is already used by another system type")]
    DuplicateName { name: String },

    #[error("system '{name}' failed in on_create: {source}")]
    Creation {
        name: String,
        #[source]
        source: WorldError,
    },

    #[error("no system with handle {handle}")]
    UnknownHandle { handle: SystemHandle },
}

/// Read-only description of a registered system.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemInfo {
    pub handle: SystemHandle,
    pub name: String,
    pub group: SystemGroup,
    pub rank: f32,
    pub enabled: bool,
}

pub(crate) struct SystemEntry {
    pub handle: SystemHandle,
    pub name: String,
    pub group: SystemGroup,
    pub rank: f32,
    pub enabled: bool,
    pub started: bool,
    pub type_id: TypeId,
    pub system: Box<dyn System>,
}

impl SystemEntry {
    pub fn info(&self) -> SystemInfo {
        SystemInfo {
            handle: self.handle,
            name: self.name.clone(),
            group: self.group,
            rank: self.rank,
            enabled: self.enabled,
        }
    }

    pub fn downcast_ref<T: System>(&self) -> Option<&T> {
        let system: &dyn System = &*self.system;
        system.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: System>(&mut self) -> Option<&mut T> {
        let system: &mut dyn System = &mut *self.system;
        system.as_any_mut().downcast_mut::<T>()
    }

    fn order_key(&self) -> (SystemGroup, f32, SystemHandle) {
        (self.group, self.rank, self.handle)
    }
}

#[derive(Default)]
pub(crate) struct SystemRegistry {
    entries: Vec<SystemEntry>,
    name_lookup: HashMap<String, SystemHandle>,
    type_lookup: HashMap<TypeId, SystemHandle>,
    next_handle: u32,
}

impl SystemRegistry {
    pub fn handle_of(&self, type_id: TypeId) -> Option<SystemHandle> {
        self.type_lookup.get(&type_id).copied()
    }

    /// Reserve a handle for a new system type under `name`.
    pub fn reserve(&mut self, name: &str, type_id: TypeId) -> Result<SystemHandle, SystemRegistrationError> {
        if self.name_lookup.contains_key(name) {
            return Err(SystemRegistrationError::DuplicateName { name: name.to_string() });
        }
        let handle = SystemHandle(self.next_handle);
        self.next_handle += 1;
        self.name_lookup.insert(name.to_string(), handle);
        self.type_lookup.insert(type_id, handle);
        Ok(handle)
    }

    /// Drop a reservation whose system never made it into the list.
    pub fn unreserve(&mut self, name: &str, type_id: TypeId) {
        self.name_lookup.remove(name);
        self.type_lookup.remove(&type_id);
    }

    pub fn insert(&mut self, entry: SystemEntry) {
        let key = entry.order_key();
        let position = self
            .entries
            .partition_point(|existing| existing.order_key() <= key);
        self.entries.insert(position, entry);
    }

    pub fn remove(&mut self, type_id: TypeId) -> Option<SystemEntry> {
        let position = self.entries.iter().position(|entry| entry.type_id == type_id)?;
        let entry = self.entries.remove(position);
        self.unreserve(&entry.name, type_id);
        Some(entry)
    }

    pub fn find(&self, type_id: TypeId) -> Option<&SystemEntry> {
        self.entries.iter().find(|entry| entry.type_id == type_id)
    }

    pub fn find_mut(&mut self, type_id: TypeId) -> Option<&mut SystemEntry> {
        self.entries.iter_mut().find(|entry| entry.type_id == type_id)
    }

    pub fn position(&self, handle: SystemHandle) -> Option<usize> {
        self.entries.iter().position(|entry| entry.handle == handle)
    }

    /// Temporarily remove the entry at `position` (order is restored by `put_back`).
    pub fn detach(&mut self, position: usize) -> SystemEntry {
        self.entries.remove(position)
    }

    pub fn put_back(&mut self, entry: SystemEntry) {
        self.insert(entry);
    }

    /// Detach every system for a phase run.
    pub fn take_all(&mut self) -> Vec<SystemEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Merge detached systems with any created while they were out.
    pub fn restore_all(&mut self, detached: Vec<SystemEntry>) {
        let created = std::mem::replace(&mut self.entries, detached);
        for entry in created {
            self.insert(entry);
        }
    }

    pub fn infos(&self) -> Vec<SystemInfo> {
        self.entries.iter().map(SystemEntry::info).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct A;
    impl System for A {}

    #[derive(Default)]
    struct B;
    impl System for B {}

    #[derive(Default)]
    struct C;
    impl System for C {}

    fn entry<T: System + Default>(
        registry: &mut SystemRegistry,
        name: &str,
        group: SystemGroup,
        rank: f32,
    ) -> SystemEntry {
        let handle = registry.reserve(name, TypeId::of::<T>()).unwrap();
        SystemEntry {
            handle,
            name: name.to_string(),
            group,
            rank,
            enabled: true,
            started: false,
            type_id: TypeId::of::<T>(),
            system: Box::new(T::default()),
        }
    }

    #[test]
    fn ordered_by_group_then_rank() {
        let mut registry = SystemRegistry::default();
        let a = entry::<A>(&mut registry, "A", SystemGroup::Presentation, 0.0);
        let b = entry::<B>(&mut registry, "B", SystemGroup::Simulation, 2.0);
        let c = entry::<C>(&mut registry, "C", SystemGroup::Simulation, 1.0);
        registry.insert(a);
        registry.insert(b);
        registry.insert(c);
        let names: Vec<_> = registry.infos().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn names_are_unique() {
        let mut registry = SystemRegistry::default();
        registry.reserve("Physics", TypeId::of::<A>()).unwrap();
        let err = registry.reserve("Physics", TypeId::of::<B>()).unwrap_err();
        assert!(matches!(err, SystemRegistrationError::DuplicateName { .. }));
    }

    #[test]
    fn restore_merges_systems_created_while_detached() {
        let mut registry = SystemRegistry::default();
        let a = entry::<A>(&mut registry, "A", SystemGroup::Simulation, 5.0);
        registry.insert(a);
        let detached = registry.take_all();
        let b = entry::<B>(&mut registry, "B", SystemGroup::Preparation, 0.0);
        registry.insert(b);
        registry.restore_all(detached);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.infos()[0].name, "B");
        assert!(registry.find(TypeId::of::<A>()).and_then(|e| e.downcast_ref::<A>()).is_some());
        assert!(registry.remove(TypeId::of::<A>()).is_some());
        assert_eq!(registry.handle_of(TypeId::of::<A>()), None);
    }
}
