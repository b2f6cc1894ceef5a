//! Parent/child links

use super::World;
use crate::ecs::entity::Entity;
use crate::ecs::error::WorldError;

impl World {
    /// Make `child` the last child of `parent`, detaching it from any previous parent.
    ///
    /// Fails without touching either entity if `parent` is `child` or one of
    /// its descendants. A no-op if the link already exists.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<(), WorldError> {
        let old_parent = self.meta(child)?.parent;
        self.meta(parent)?;
        if child == parent {
            tracing::error!(%child, "entity cannot parent itself");
            return Err(WorldError::SelfParent { entity: child });
        }

        let mut ancestor = parent;
        while !ancestor.is_null() {
            if ancestor == child {
                tracing::error!(%child, %parent, "parenting would create a cycle");
                return Err(WorldError::CyclicParent { child, parent });
            }
            ancestor = self.entity_metadata[ancestor.index() as usize].parent;
        }

        if old_parent == parent {
            return Ok(());
        }
        if !old_parent.is_null() {
            self.entity_metadata[old_parent.index() as usize]
                .children
                .retain(|&c| c != child);
        }
        self.link_child(child, parent);
        Ok(())
    }

    /// Append `child` to `parent` without checks. `child` must be detached
    /// and the link must not close a cycle.
    pub(super) fn link_child(&mut self, child: Entity, parent: Entity) {
        self.entity_metadata[parent.index() as usize].children.push(child);
        self.entity_metadata[child.index() as usize].parent = parent;
    }

    /// Detach `child` from `parent`, making it a root.
    pub fn remove_child(&mut self, child: Entity, parent: Entity) -> Result<(), WorldError> {
        let current = self.meta(child)?.parent;
        self.meta(parent)?;
        if current != parent {
            tracing::warn!(%child, %parent, "entity is not a child of the given parent");
            return Err(WorldError::NotAChild { child, parent });
        }
        self.entity_metadata[parent.index() as usize]
            .children
            .retain(|&c| c != child);
        self.entity_metadata[child.index() as usize].parent = Entity::NULL;
        Ok(())
    }

    /// Parent of `entity`, null for roots.
    pub fn parent(&self, entity: Entity) -> Result<Entity, WorldError> {
        self.meta(entity).map(|row| row.parent)
    }

    pub fn children(&self, entity: Entity) -> Result<&[Entity], WorldError> {
        self.meta(entity).map(|row| row.children.as_slice())
    }

    pub fn child(&self, entity: Entity, index: usize) -> Result<Option<Entity>, WorldError> {
        self.meta(entity).map(|row| row.children.get(index).copied())
    }

    pub fn children_amount(&self, entity: Entity) -> Result<usize, WorldError> {
        self.meta(entity).map(|row| row.children.len())
    }

    pub fn is_root(&self, entity: Entity) -> Result<bool, WorldError> {
        self.meta(entity).map(|row| row.parent.is_null())
    }

    /// Topmost ancestor of `entity` (itself for roots).
    pub fn root(&self, entity: Entity) -> Result<Entity, WorldError> {
        let mut current = entity;
        let mut parent = self.meta(entity)?.parent;
        while !parent.is_null() {
            current = parent;
            parent = self.entity_metadata[parent.index() as usize].parent;
        }
        Ok(current)
    }

    /// All descendants in pre-order, excluding `entity`.
    pub fn descendants(&self, entity: Entity) -> Result<Vec<Entity>, WorldError> {
        let mut out = Vec::new();
        self.for_each_descendant(entity, |e| out.push(e))?;
        Ok(out)
    }

    pub fn for_each_descendant(
        &self,
        entity: Entity,
        mut f: impl FnMut(Entity),
    ) -> Result<(), WorldError> {
        let mut stack: Vec<Entity> = self.meta(entity)?.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            f(next);
            stack.extend(
                self.entity_metadata[next.index() as usize]
                    .children
                    .iter()
                    .rev()
                    .copied(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(world: &mut World) -> (Entity, Entity, Entity, Entity) {
        let root = world.create_entity("root");
        let a = world.create_entity("a");
        let b = world.create_entity("b");
        let a1 = world.create_entity("a1");
        world.set_parent(a, root).unwrap();
        world.set_parent(b, root).unwrap();
        world.set_parent(a1, a).unwrap();
        (root, a, b, a1)
    }

    #[test]
    fn cycles_are_rejected_before_mutation() {
        let mut world = World::new();
        let (root, a, _, a1) = family(&mut world);

        assert!(matches!(
            world.set_parent(root, a1),
            Err(WorldError::CyclicParent { .. })
        ));
        assert!(matches!(world.set_parent(a, a), Err(WorldError::SelfParent { .. })));
        assert!(world.is_root(root).unwrap());
        assert_eq!(world.children(a).unwrap(), &[a1]);
    }

    #[test]
    fn reparenting_moves_between_children_lists() {
        let mut world = World::new();
        let (root, a, b, a1) = family(&mut world);
        world.set_parent(a1, b).unwrap();
        assert!(world.children(a).unwrap().is_empty());
        assert_eq!(world.children(b).unwrap(), &[a1]);
        assert_eq!(world.parent(a1).unwrap(), b);
        assert_eq!(world.root(a1).unwrap(), root);

        world.set_parent(a1, b).unwrap();
        assert_eq!(world.children_amount(b).unwrap(), 1);
        assert_eq!(world.child(root, 1).unwrap(), Some(b));
        assert_eq!(world.child(root, 5).unwrap(), None);
    }

    #[test]
    fn descendants_are_pre_order() {
        let mut world = World::new();
        let (root, a, b, a1) = family(&mut world);
        assert_eq!(world.descendants(root).unwrap(), vec![a, a1, b]);
    }

    #[test]
    fn remove_child_requires_the_link() {
        let mut world = World::new();
        let (root, a, b, a1) = family(&mut world);
        assert!(matches!(
            world.remove_child(a1, b),
            Err(WorldError::NotAChild { .. })
        ));
        world.remove_child(a, root).unwrap();
        assert!(world.is_root(a).unwrap());
        assert_eq!(world.children(root).unwrap(), &[b]);
    }

    #[test]
    fn delete_cascades_to_children() {
        let mut world = World::new();
        let (root, a, b, a1) = family(&mut world);
        world.delete_entity(a).unwrap();
        assert!(!world.is_valid(a));
        assert!(!world.is_valid(a1));
        assert!(world.is_valid(b));
        assert_eq!(world.children(root).unwrap(), &[b]);
        assert_eq!(world.entity_count(), 2);
    }
}
