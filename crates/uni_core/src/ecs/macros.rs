//! Convenience macros for entity spawning

/// Spawn a named entity holding the given data components.
///
/// Expands to [`World::spawn_bundle`](crate::ecs::World::spawn_bundle), so
/// the entity lands directly in the archetype for its component set and
/// never migrates. Evaluates to `Result<Entity, WorldError>`.
///
/// # Examples
///
/// ```ignore
/// let entity = spawn!(world, "ship",
///     Position { x: 0.0, y: 0.0, z: 0.0 },
///     Velocity { x: 1.0, y: 0.0, z: 0.0 },
/// )?;
/// ```
#[macro_export]
macro_rules! spawn {
    ($world:expr, $name:expr $(, $component:expr)+ $(,)?) => {
        $world.spawn_bundle($name, ($($component,)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::ecs::{Transform, World, WorldError};
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Health(u32);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    struct Armor(u16, u16);

    #[test]
    fn spawn_places_entity_in_its_final_archetype() {
        let mut world = World::new();
        world.register_data_component::<Health>("Health").unwrap();
        world.register_data_component::<Armor>("Armor").unwrap();

        let e = spawn!(world, "knight", Health(100), Armor(3, 4), Transform::default()).unwrap();
        assert_eq!(world.get_component_data::<Health>(e).unwrap(), Health(100));
        assert_eq!(world.get_component_data::<Armor>(e).unwrap(), Armor(3, 4));
        assert_eq!(world.entity_name(e).unwrap(), "knight");
        let archetype = world.entity_archetype(e).unwrap();
        assert_eq!(world.archetype_info(archetype).unwrap().name(), "Transform|Health|Armor");
        assert_eq!(world.counters().get("structural_moves"), 0);

        let single = spawn!(world, "pawn", Health(1)).unwrap();
        assert_ne!(world.entity_archetype(single).unwrap(), archetype);
    }

    #[test]
    fn spawn_rejects_repeated_types() {
        let mut world = World::new();
        world.register_data_component::<Health>("Health").unwrap();
        assert!(matches!(
            spawn!(world, "twice", Health(1), Health(2)),
            Err(WorldError::AliasedComponent { .. })
        ));
        assert_eq!(world.entity_count(), 0);
    }
}
