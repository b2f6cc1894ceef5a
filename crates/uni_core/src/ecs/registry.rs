// registry.rs - Per-world component type registry
//
// Maps Rust types and names to registration-time ids. Data and private
// components share one id space. The by-type and by-name maps are always
// updated together after every check has passed.

use std::any::TypeId;
use std::collections::HashMap;
use std::mem::{align_of, size_of};
use thiserror::Error;

use super::chunk::CHUNK_ALIGN;
use super::component::{ComponentId, DataComponent, DataComponentType};
use super::private_component::{PrivateComponent, PrivateComponentType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("type '{type_name}' is already registered as '{existing}'")]
    DuplicateType {
        type_name: &'static str,
        existing: String,
    },

    #[error("component name '{name}' is already taken")]
    DuplicateName { name: String },

    #[error("component '{name}' needs {align}-byte alignment, chunks provide {max}")]
    AlignmentTooLarge { name: String, align: usize, max: usize },

    #[error("component '{name}' is zero-sized")]
    ZeroSized { name: String },

    #[error("type '{type_name}' is not registered")]
    Unregistered { type_name: &'static str },

    #[error("no component is registered under '{name}'")]
    UnknownName { name: String },

    #[error("component '{name}' is not a {expected} component")]
    KindMismatch { name: String, expected: &'static str },
}

/// What a registered id refers to.
#[derive(Debug, Clone)]
pub enum ComponentKind {
    Data(DataComponentType),
    Private(PrivateComponentType),
}

impl ComponentKind {
    pub fn name(&self) -> &str {
        match self {
            ComponentKind::Data(ty) => &ty.name,
            ComponentKind::Private(ty) => &ty.name,
        }
    }
}

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    kinds: Vec<ComponentKind>,
    by_type: HashMap<TypeId, ComponentId>,
    by_name: HashMap<String, ComponentId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_data<T: DataComponent>(&mut self, name: &str) -> Result<ComponentId, RegistryError> {
        self.check_unique::<T>(name)?;
        let (size, align) = (size_of::<T>(), align_of::<T>());
        if size == 0 {
            return Err(RegistryError::ZeroSized { name: name.to_string() });
        }
        if align > CHUNK_ALIGN {
            return Err(RegistryError::AlignmentTooLarge {
                name: name.to_string(),
                align,
                max: CHUNK_ALIGN,
            });
        }

        let id = self.next_id();
        self.insert::<T>(
            name,
            ComponentKind::Data(DataComponentType {
                name: name.to_string(),
                id,
                size,
                align,
                offset: 0,
            }),
        );
        tracing::debug!(component = name, %id, size, align, "registered data component");
        Ok(id)
    }

    pub fn register_private<T: PrivateComponent + Default>(
        &mut self,
        name: &str,
    ) -> Result<ComponentId, RegistryError> {
        self.check_unique::<T>(name)?;
        let id = self.next_id();
        self.insert::<T>(
            name,
            ComponentKind::Private(PrivateComponentType {
                name: name.to_string(),
                id,
                factory: instantiate::<T>,
            }),
        );
        tracing::debug!(component = name, %id, "registered private component");
        Ok(id)
    }

    pub fn id_of<T: 'static>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn id_of_type_id(&self, type_id: TypeId) -> Option<ComponentId> {
        self.by_type.get(&type_id).copied()
    }

    pub fn id_by_name(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    pub fn kind(&self, id: ComponentId) -> Option<&ComponentKind> {
        self.kinds.get(id.index() as usize)
    }

    pub fn name_of(&self, id: ComponentId) -> Option<&str> {
        self.kind(id).map(ComponentKind::name)
    }

    pub fn data_type(&self, id: ComponentId) -> Option<&DataComponentType> {
        match self.kind(id)? {
            ComponentKind::Data(ty) => Some(ty),
            ComponentKind::Private(_) => None,
        }
    }

    pub fn private_type(&self, id: ComponentId) -> Option<&PrivateComponentType> {
        match self.kind(id)? {
            ComponentKind::Private(ty) => Some(ty),
            ComponentKind::Data(_) => None,
        }
    }

    /// Data descriptor for `T`, failing if `T` is unknown or not a data component.
    pub fn data_type_of<T: 'static>(&self) -> Result<&DataComponentType, RegistryError> {
        let id = self.id_of::<T>().ok_or(RegistryError::Unregistered {
            type_name: std::any::type_name::<T>(),
        })?;
        self.data_type(id).ok_or_else(|| RegistryError::KindMismatch {
            name: self.name_of(id).unwrap_or_default().to_string(),
            expected: "data",
        })
    }

    pub fn private_type_of<T: 'static>(&self) -> Result<&PrivateComponentType, RegistryError> {
        let id = self.id_of::<T>().ok_or(RegistryError::Unregistered {
            type_name: std::any::type_name::<T>(),
        })?;
        self.private_type(id).ok_or_else(|| RegistryError::KindMismatch {
            name: self.name_of(id).unwrap_or_default().to_string(),
            expected: "private",
        })
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentKind> {
        self.kinds.iter()
    }

    fn check_unique<T: 'static>(&self, name: &str) -> Result<(), RegistryError> {
        if let Some(&existing) = self.by_type.get(&TypeId::of::<T>()) {
            return Err(RegistryError::DuplicateType {
                type_name: std::any::type_name::<T>(),
                existing: self.name_of(existing).unwrap_or_default().to_string(),
            });
        }
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateName { name: name.to_string() });
        }
        Ok(())
    }

    fn next_id(&self) -> ComponentId {
        ComponentId::new(self.kinds.len() as u32)
    }

    fn insert<T: 'static>(&mut self, name: &str, kind: ComponentKind) {
        let id = self.next_id();
        self.kinds.push(kind);
        self.by_type.insert(TypeId::of::<T>(), id);
        self.by_name.insert(name.to_string(), id);
    }
}

fn instantiate<T: PrivateComponent + Default>() -> Box<dyn PrivateComponent> {
    Box::new(T::default())
}
