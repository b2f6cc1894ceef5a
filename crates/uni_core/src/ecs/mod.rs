//! Entity Component System

mod archetype;
mod chunk;
mod component;
mod entity;
mod error;
mod handle;
mod macros;
mod metadata;
mod private_component;
mod query;
mod registry;
mod system;
mod transform;
mod world;

pub use archetype::{ArchetypeInfo, EntityArchetype};
pub use chunk::CHUNK_ALIGN;
pub use component::{AsAny, ComponentId, ComponentTuple, DataComponent, DataComponentType};
pub use entity::Entity;
pub use error::WorldError;
pub use handle::Handle;
pub use private_component::{PrivateComponent, PrivateComponentType};
pub use query::{EntityQuery, ForEachOptions, QueryFilterKind};
pub use registry::{ComponentKind, ComponentRegistry, RegistryError};
pub use system::{
    System, SystemGroup, SystemHandle, SystemInfo, SystemPhase, SystemRegistrationError,
    SystemResult,
};
pub use transform::{GlobalTransform, Transform};
pub use world::{DataComponentBlob, EntitySnapshot, PrivateComponentBlob, World, WorldSnapshot};
