//! # Component System
//!
//! Components are plain data attached to entities, one pool per type.
//!
//! Each registry assigns a small dense [`ComponentId`] to a type the first
//! time it is used. The [`ComponentIndex`] is the keyed fallback that maps a
//! `TypeId` to that integer; pools are then addressed by plain indexing.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::entity::EntityId;
use super::registry::Registry;
use super::storage::{downcast_mut, AnyPool};

/// Marker trait for ECS components.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default)]
/// struct Velocity {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Velocity {}
/// ```
pub trait Component: Send + Sync + 'static {}

/// Dense per-registry identifier of a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Creates an ID from a pool index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the pool index of this ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Metadata recorded when a component type is first used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Dense ID of the type.
    pub id: ComponentId,
    /// Type name, for diagnostics.
    pub name: &'static str,
    /// Rust type ID.
    pub type_id: TypeId,
}

/// Maps component types to their dense IDs.
#[derive(Clone, Debug, Default)]
pub struct ComponentIndex {
    by_type: HashMap<TypeId, ComponentId>,
    infos: Vec<ComponentInfo>,
}

impl ComponentIndex {
    /// Returns the ID of `T`, if the type was ever used.
    #[inline]
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the ID of `T`, assigning the next free one on first use.
    ///
    /// The flag is `true` when the ID was just assigned.
    pub(crate) fn register<T: Component>(&mut self) -> (ComponentId, bool) {
        if let Some(id) = self.get::<T>() {
            return (id, false);
        }
        let id = ComponentId::from_index(self.infos.len());
        self.by_type.insert(TypeId::of::<T>(), id);
        self.infos.push(ComponentInfo {
            id,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
        });
        (id, true)
    }

    /// Returns the metadata of a registered ID.
    #[must_use]
    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Returns the type name of a registered ID.
    #[must_use]
    pub fn name(&self, id: ComponentId) -> &'static str {
        self.info(id).map_or("<unregistered>", |info| info.name)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns `true` if no type was registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Iterates over all registered types in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }
}

/// A statically known list of component types, written as a tuple.
///
/// Used for query arguments (`(Position, Velocity)`), group signatures and
/// exclusion lists. The empty tuple is the empty list.
pub trait ComponentSet: 'static {
    /// Mutable references to one entity's components, in tuple order.
    type RefsMut<'a>;

    /// Number of types in the list.
    const LEN: usize;

    /// Returns the IDs of every type, creating missing pools.
    fn assure(registry: &mut Registry) -> Vec<ComponentId>;

    /// Returns the IDs of every type that was already registered.
    fn lookup(index: &ComponentIndex) -> Vec<Option<ComponentId>>;

    /// Returns the type names, in tuple order.
    fn names() -> Vec<&'static str>;

    /// Fetches one entity's components from pools given in tuple order.
    fn fetch_mut<'a, I>(pools: I, entity: EntityId) -> Option<Self::RefsMut<'a>>
    where
        I: Iterator<Item = &'a mut Box<dyn AnyPool>>;
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! impl_component_set {
    ($($name:ident),*) => {
        impl<$($name: Component),*> ComponentSet for ($($name,)*) {
            type RefsMut<'a> = ($(&'a mut $name,)*);

            const LEN: usize = count!($($name)*);

            #[allow(unused_variables)]
            fn assure(registry: &mut Registry) -> Vec<ComponentId> {
                vec![$(registry.assure::<$name>()),*]
            }

            #[allow(unused_variables)]
            fn lookup(index: &ComponentIndex) -> Vec<Option<ComponentId>> {
                vec![$(index.get::<$name>()),*]
            }

            fn names() -> Vec<&'static str> {
                vec![$(type_name::<$name>()),*]
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn fetch_mut<'a, I>(pools: I, entity: EntityId) -> Option<Self::RefsMut<'a>>
            where
                I: Iterator<Item = &'a mut Box<dyn AnyPool>>,
            {
                let mut pools = pools;
                $(
                    let $name = downcast_mut::<$name>(pools.next()?).get_mut(entity)?;
                )*
                Some(($($name,)*))
            }
        }
    };
}

impl_component_set!();
impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    impl Component for Position {}

    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn test_ids_assigned_on_first_use() {
        let mut index = ComponentIndex::default();
        assert_eq!(index.get::<Position>(), None);

        let (position, fresh) = index.register::<Position>();
        assert!(fresh);
        assert_eq!(position.index(), 0);

        let (velocity, fresh) = index.register::<Velocity>();
        assert!(fresh);
        assert_eq!(velocity.index(), 1);

        assert_eq!(index.register::<Position>(), (position, false));
        assert_eq!(index.len(), 2);
        assert!(index.name(velocity).ends_with("Velocity"));
    }

    #[test]
    fn test_set_lengths() {
        assert_eq!(<() as ComponentSet>::LEN, 0);
        assert_eq!(<(Position,) as ComponentSet>::LEN, 1);
        assert_eq!(<(Position, Velocity) as ComponentSet>::LEN, 2);
    }
}
