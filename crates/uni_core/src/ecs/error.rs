use thiserror::Error;

use super::archetype::EntityArchetype;
use super::entity::Entity;
use super::query::EntityQuery;
use super::registry::RegistryError;

/// Errors returned by [`World`](super::World) operations.
///
/// A failed call leaves the world unchanged.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("entity {entity} is null, deleted or stale")]
    InvalidEntity { entity: Entity },

    #[error("component type '{type_name}' is not registered as a data component")]
    UnregisteredComponent { type_name: String },

    #[error("entity {entity} has no component '{component}'")]
    MissingComponent { entity: Entity, component: String },

    #[error("entity {entity} has no private component '{component}'")]
    MissingPrivateComponent { entity: Entity, component: String },

    #[error("entity {entity} cannot be its own parent")]
    SelfParent { entity: Entity },

    #[error("parenting {child} under {parent} would create a cycle")]
    CyclicParent { child: Entity, parent: Entity },

    #[error("entity {child} is not a child of {parent}")]
    NotAChild { child: Entity, parent: Entity },

    #[error("archetype {archetype} does not exist")]
    InvalidArchetype { archetype: EntityArchetype },

    #[error("archetype '{name}' needs {entity_size} bytes per entity, more than a {chunk_bytes}-byte chunk holds")]
    ArchetypeTooLarge {
        name: String,
        entity_size: usize,
        chunk_bytes: usize,
    },

    #[error("query {query} is not valid")]
    InvalidQuery { query: EntityQuery },

    #[error("component '{component}' appears more than once in one access tuple")]
    AliasedComponent { component: String },

    #[error("no component is registered under '{name}'")]
    UnknownComponentName { name: String },

    #[error("component '{name}' is {expected} bytes, snapshot holds {found}")]
    ComponentSizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("failed to restore private component '{name}': {source}")]
    PrivateComponentPayload {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("handle {handle} appears more than once in a snapshot")]
    DuplicateHandle { handle: super::handle::Handle },

    #[error("snapshot entity {handle} has a broken hierarchy link: {reason}")]
    SnapshotHierarchy {
        handle: super::handle::Handle,
        reason: &'static str,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
