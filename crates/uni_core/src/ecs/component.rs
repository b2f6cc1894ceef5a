// component.rs - Component identity and type descriptors
//
// Data components are plain bytes living in chunks. Ids are handed out by
// the world's registry at registration time, never derived from the type.

use bytemuck::Pod;
use std::any::{Any, TypeId};
use std::fmt;

/// Registration-time id, unique within one world's registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u32);

impl ComponentId {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Marker for types that may be stored inline in chunk memory.
///
/// `Pod` guarantees the type is `Copy`, has no padding or pointers, and
/// that any bit pattern (including all zeroes) is a valid value.
pub trait DataComponent: Pod + Send + Sync + 'static {}

impl<T: Pod + Send + Sync + 'static> DataComponent for T {}

/// Layout descriptor for a registered data component.
///
/// `offset` is zero in the registry and set to the start of the
/// component's array when copied into an archetype layout.
#[derive(Clone, Debug)]
pub struct DataComponentType {
    pub name: String,
    pub id: ComponentId,
    pub size: usize,
    pub align: usize,
    pub offset: usize,
}

/// Descriptors match on id and size only.
impl PartialEq for DataComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.size == other.size
    }
}

impl Eq for DataComponentType {}

/// Upcast helper so trait objects can be downcast after lookup by id.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A tuple of distinct data components, used for archetype creation,
/// query filters and typed `for_each` access.
pub trait ComponentTuple: 'static {
    /// Mutable references to one entity's components.
    type Refs<'a>;

    fn type_ids() -> Vec<TypeId>;

    fn type_names() -> Vec<&'static str>;

    /// Raw bytes of each value, in tuple order.
    fn component_bytes(&self) -> Vec<&[u8]>;

    /// # Safety
    /// `columns[k]` must point at the first element of a column holding the
    /// k-th tuple type, `row` must be in bounds for every column and no
    /// other reference to those elements may be live for `'a`.
    unsafe fn fetch<'a>(columns: &[*mut u8], row: usize) -> Self::Refs<'a>;
}

macro_rules! impl_component_tuple {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: DataComponent),+> ComponentTuple for ($($name,)+) {
            type Refs<'a> = ($(&'a mut $name,)+);

            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$name>()),+]
            }

            fn type_names() -> Vec<&'static str> {
                vec![$(std::any::type_name::<$name>()),+]
            }

            fn component_bytes(&self) -> Vec<&[u8]> {
                vec![$(bytemuck::bytes_of(&self.$idx)),+]
            }

            #[inline]
            unsafe fn fetch<'a>(columns: &[*mut u8], row: usize) -> Self::Refs<'a> {
                ($(&mut *(columns[$idx] as *mut $name).add(row),)+)
            }
        }
    };
}

impl_component_tuple!(A 0);
impl_component_tuple!(A 0, B 1);
impl_component_tuple!(A 0, B 1, C 2);
impl_component_tuple!(A 0, B 1, C 2, D 3);
impl_component_tuple!(A 0, B 1, C 2, D 3, E 4);
impl_component_tuple!(A 0, B 1, C 2, D 3, E 4, F 5);
