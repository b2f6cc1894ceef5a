//! Private component attachment

use super::World;
use crate::ecs::component::ComponentId;
use crate::ecs::entity::Entity;
use crate::ecs::error::WorldError;
use crate::ecs::private_component::{PrivateComponent, PrivateComponentElement};
use crate::ecs::registry::RegistryError;

impl World {
    /// The entity's `T`, attaching a default one first if it has none.
    pub fn get_or_set_private_component<T: PrivateComponent + Default>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut T, WorldError> {
        let id = self.private_id::<T>()?;
        let position = match self.meta(entity)?.private_index(id) {
            Some(position) => position,
            None => self.attach_private(entity, id, Box::new(T::default()), true),
        };
        self.private_element_mut(entity, position)
            .downcast_mut::<T>()
            .ok_or_else(|| missing_private::<T>(entity))
    }

    /// Attach `component`, replacing (and destroying) any existing `T`.
    pub fn set_private_component<T: PrivateComponent>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), WorldError> {
        let id = self.private_id::<T>()?;
        match self.meta(entity)?.private_index(id) {
            Some(position) => {
                let element = self.private_element_mut(entity, position);
                let mut old = std::mem::replace(&mut element.component, Box::new(component));
                element.started = false;
                old.on_destroy(entity);
                element.component.on_create(entity);
            }
            None => {
                self.attach_private(entity, id, Box::new(component), true);
            }
        }
        Ok(())
    }

    pub fn get_private_component<T: PrivateComponent>(&self, entity: Entity) -> Result<&T, WorldError> {
        let id = self.private_id::<T>()?;
        let row = self.meta(entity)?;
        row.private_index(id)
            .and_then(|position| row.private_components[position].downcast_ref::<T>())
            .ok_or_else(|| missing_private::<T>(entity))
    }

    pub fn get_private_component_mut<T: PrivateComponent>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut T, WorldError> {
        let id = self.private_id::<T>()?;
        let position = self
            .meta(entity)?
            .private_index(id)
            .ok_or_else(|| missing_private::<T>(entity))?;
        self.private_element_mut(entity, position)
            .downcast_mut::<T>()
            .ok_or_else(|| missing_private::<T>(entity))
    }

    pub fn has_private_component<T: PrivateComponent>(&self, entity: Entity) -> Result<bool, WorldError> {
        let id = self.private_id::<T>()?;
        self.meta(entity)?;
        Ok(self.private_storage.is_owner(id, entity))
    }

    /// Detach and destroy the entity's `T`.
    pub fn remove_private_component<T: PrivateComponent>(&mut self, entity: Entity) -> Result<(), WorldError> {
        let id = self.private_id::<T>()?;
        let row = self.meta_mut(entity)?;
        let position = row
            .private_index(id)
            .ok_or_else(|| missing_private::<T>(entity))?;
        let mut element = row.private_components.remove(position);
        element.component.on_destroy(entity);
        self.private_storage.remove_owner(id, entity);
        Ok(())
    }

    /// Every entity that currently owns a `T`.
    pub fn private_component_owners<T: PrivateComponent>(&self) -> Result<&[Entity], WorldError> {
        let id = self.private_id::<T>()?;
        Ok(self.private_storage.owners(id))
    }

    pub fn set_private_component_enabled<T: PrivateComponent>(
        &mut self,
        entity: Entity,
        enabled: bool,
    ) -> Result<(), WorldError> {
        let id = self.private_id::<T>()?;
        let position = self
            .meta(entity)?
            .private_index(id)
            .ok_or_else(|| missing_private::<T>(entity))?;
        let element = self.private_element_mut(entity, position);
        if element.enabled != enabled {
            element.enabled = enabled;
            if enabled {
                element.component.on_enable();
            } else {
                element.component.on_disable();
            }
        }
        Ok(())
    }

    pub fn is_private_component_enabled<T: PrivateComponent>(
        &self,
        entity: Entity,
    ) -> Result<bool, WorldError> {
        let id = self.private_id::<T>()?;
        let row = self.meta(entity)?;
        row.private_index(id)
            .map(|position| row.private_components[position].enabled)
            .ok_or_else(|| missing_private::<T>(entity))
    }

    /// The private component registered under `name`, for tooling that only
    /// knows type names. Downcast through [`AsAny`](crate::ecs::AsAny).
    pub fn get_private_component_by_name(
        &self,
        entity: Entity,
        name: &str,
    ) -> Result<&dyn PrivateComponent, WorldError> {
        let id = self.private_id_by_name(name)?;
        let row = self.meta(entity)?;
        row.private_index(id)
            .map(|position| &*row.private_components[position].component)
            .ok_or_else(|| missing_private_named(entity, name))
    }

    pub fn has_private_component_by_name(&self, entity: Entity, name: &str) -> Result<bool, WorldError> {
        let id = self.private_id_by_name(name)?;
        self.meta(entity)?;
        Ok(self.private_storage.is_owner(id, entity))
    }

    /// Visit the entity's private components in attachment order.
    pub fn for_each_private_component(
        &self,
        entity: Entity,
        mut f: impl FnMut(&str, &dyn PrivateComponent),
    ) -> Result<(), WorldError> {
        for element in &self.meta(entity)?.private_components {
            let name = self
                .registry
                .private_type(element.id)
                .map_or("", |ty| ty.name.as_str());
            f(name, &*element.component);
        }
        Ok(())
    }

    /// Push a new element, index its owner and run `on_create`. Returns its position.
    pub(super) fn attach_private(
        &mut self,
        entity: Entity,
        id: ComponentId,
        component: Box<dyn PrivateComponent>,
        enabled: bool,
    ) -> usize {
        let components = &mut self.entity_metadata[entity.index() as usize].private_components;
        components.push(PrivateComponentElement {
            id,
            enabled,
            started: false,
            component,
        });
        let position = components.len() - 1;
        components[position].component.on_create(entity);
        self.private_storage.set_owner(id, entity);
        position
    }

    fn private_element_mut(&mut self, entity: Entity, position: usize) -> &mut PrivateComponentElement {
        &mut self.entity_metadata[entity.index() as usize].private_components[position]
    }

    fn private_id_by_name(&self, name: &str) -> Result<ComponentId, WorldError> {
        let id = self.registry.id_by_name(name).ok_or_else(|| {
            tracing::warn!(component = name, "no component registered under this name");
            WorldError::UnknownComponentName {
                name: name.to_string(),
            }
        })?;
        match self.registry.private_type(id) {
            Some(ty) => Ok(ty.id),
            None => {
                tracing::warn!(component = name, "component is not a private component");
                Err(RegistryError::KindMismatch {
                    name: name.to_string(),
                    expected: "private",
                }
                .into())
            }
        }
    }

    fn private_id<T: PrivateComponent>(&self) -> Result<ComponentId, WorldError> {
        self.registry
            .private_type_of::<T>()
            .map(|ty| ty.id)
            .map_err(|err| {
                tracing::warn!(%err, "private component lookup failed");
                err.into()
            })
    }
}

fn missing_private<T>(entity: Entity) -> WorldError {
    missing_private_named(entity, std::any::type_name::<T>())
}

fn missing_private_named(entity: Entity, component: &str) -> WorldError {
    tracing::warn!(%entity, component, "entity lacks private component");
    WorldError::MissingPrivateComponent {
        entity,
        component: component.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::AsAny;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Script {
        source: String,
        created: usize,
        log: Option<Arc<AtomicUsize>>,
    }

    impl PrivateComponent for Script {
        fn on_create(&mut self, _owner: Entity) {
            self.created += 1;
        }

        fn on_destroy(&mut self, _owner: Entity) {
            if let Some(log) = &self.log {
                log.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[derive(Default)]
    struct Light {
        enabled_calls: usize,
        entity_disabled: bool,
    }

    impl PrivateComponent for Light {
        fn on_enable(&mut self) {
            self.enabled_calls += 1;
        }

        fn on_entity_disable(&mut self) {
            self.entity_disabled = true;
        }

        fn on_entity_enable(&mut self) {
            self.entity_disabled = false;
        }
    }

    fn world() -> World {
        let mut world = World::new();
        world.register_private_component::<Script>("Script").unwrap();
        world.register_private_component::<Light>("Light").unwrap();
        world
    }

    #[test]
    fn owners_list_tracks_deletion() {
        let mut world = world();
        let keep = world.create_entity("keep");
        let e = world.create_entity("e");
        world.get_or_set_private_component::<Script>(keep).unwrap();
        world.get_or_set_private_component::<Script>(e).unwrap().source = "run()".into();

        let owners = world.private_component_owners::<Script>().unwrap();
        assert!(owners.contains(&e));
        let before = owners.len();

        world.delete_entity(e).unwrap();
        let owners = world.private_component_owners::<Script>().unwrap();
        assert!(!owners.contains(&e));
        assert_eq!(owners.len(), before - 1);
    }

    #[test]
    fn get_or_set_creates_once() {
        let mut world = world();
        let e = world.create_entity("e");
        world.get_or_set_private_component::<Script>(e).unwrap().source = "a".into();
        let script = world.get_or_set_private_component::<Script>(e).unwrap();
        assert_eq!(script.source, "a");
        assert_eq!(script.created, 1);
        assert_eq!(world.private_component_owners::<Script>().unwrap().len(), 1);
    }

    #[test]
    fn replace_and_remove_run_destroy_hooks() {
        let mut world = world();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let e = world.create_entity("e");
        world
            .set_private_component(e, Script { log: Some(destroyed.clone()), ..Script::default() })
            .unwrap();
        world
            .set_private_component(e, Script { source: "v2".into(), log: Some(destroyed.clone()), ..Script::default() })
            .unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(world.get_private_component::<Script>(e).unwrap().source, "v2");

        world.remove_private_component::<Script>(e).unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
        assert!(!world.has_private_component::<Script>(e).unwrap());
        assert!(world.private_component_owners::<Script>().unwrap().is_empty());
        assert!(matches!(
            world.remove_private_component::<Script>(e),
            Err(WorldError::MissingPrivateComponent { .. })
        ));
    }

    #[test]
    fn delete_runs_destroy_hooks() {
        let mut world = world();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let parent = world.create_entity("parent");
        let child = world.create_entity("child");
        world.set_parent(child, parent).unwrap();
        for e in [parent, child] {
            world
                .set_private_component(e, Script { log: Some(destroyed.clone()), ..Script::default() })
                .unwrap();
        }
        world.delete_entity(parent).unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn enable_hooks_fire() {
        let mut world = world();
        let e = world.create_entity("lamp");
        world.get_or_set_private_component::<Light>(e).unwrap();

        world.set_private_component_enabled::<Light>(e, false).unwrap();
        world.set_private_component_enabled::<Light>(e, true).unwrap();
        world.set_private_component_enabled::<Light>(e, true).unwrap();
        assert_eq!(world.get_private_component::<Light>(e).unwrap().enabled_calls, 1);

        world.set_enable(e, false).unwrap();
        assert!(world.get_private_component::<Light>(e).unwrap().entity_disabled);
        world.set_enable(e, true).unwrap();
        assert!(!world.get_private_component::<Light>(e).unwrap().entity_disabled);
    }

    #[test]
    fn unregistered_private_types_fail() {
        #[derive(Default)]
        struct Unknown;
        impl PrivateComponent for Unknown {}

        let mut world = world();
        let e = world.create_entity("e");
        assert!(matches!(
            world.get_or_set_private_component::<Unknown>(e),
            Err(WorldError::Registry(_))
        ));
    }

    #[test]
    fn components_are_reachable_by_registered_name() {
        let mut world = world();
        let e = world.create_entity("e");
        world.get_or_set_private_component::<Script>(e).unwrap().source = "tick()".into();
        world.get_or_set_private_component::<Light>(e).unwrap();

        assert!(world.has_private_component_by_name(e, "Script").unwrap());
        let script = world.get_private_component_by_name(e, "Script").unwrap();
        assert_eq!(script.as_any().downcast_ref::<Script>().unwrap().source, "tick()");

        world.remove_private_component::<Light>(e).unwrap();
        assert!(!world.has_private_component_by_name(e, "Light").unwrap());
        assert!(matches!(
            world.get_private_component_by_name(e, "Light"),
            Err(WorldError::MissingPrivateComponent { .. })
        ));
        assert!(matches!(
            world.has_private_component_by_name(e, "Missing"),
            Err(WorldError::UnknownComponentName { .. })
        ));
        assert!(matches!(
            world.get_private_component_by_name(e, "Transform"),
            Err(WorldError::Registry(RegistryError::KindMismatch { .. }))
        ));
    }

    #[test]
    fn for_each_private_component_visits_in_attachment_order() {
        let mut world = world();
        let e = world.create_entity("e");
        world.get_or_set_private_component::<Light>(e).unwrap();
        world.get_or_set_private_component::<Script>(e).unwrap();

        let mut names = Vec::new();
        world
            .for_each_private_component(e, |name, component| {
                assert_eq!(name == "Script", component.as_any().is::<Script>());
                names.push(name.to_string());
            })
            .unwrap();
        assert_eq!(names, vec!["Light", "Script"]);

        world.delete_entity(e).unwrap();
        assert!(world.for_each_private_component(e, |_, _| {}).is_err());
    }
}
