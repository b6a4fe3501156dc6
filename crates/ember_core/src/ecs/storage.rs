//! # Component Storage
//!
//! A sparse set plus a dense component array kept in lockstep.
//!
//! ```text
//! packed:      [ e4, e1, e9 ]
//! components:  [ c4, c1, c9 ]   <- components[i] belongs to packed[i]
//! ```
//!
//! - Lookup is O(1) through the sparse set
//! - Removal swaps with the last element in both arrays
//! - Iteration walks the dense arrays directly, no per-element lookup
//!
//! Zero-sized tag components cost only their sparse-set entry: a `Vec` of a
//! zero-sized type never allocates.

use std::any::{type_name, Any};

use super::component::Component;
use super::entity::EntityId;
use super::signal::{Signal, SignalKind, Sink};
use super::sparse_set::SparseSet;
use crate::error::{EcsError, EcsResult};

/// Storage for a single component type.
///
/// # Type Parameters
///
/// * `T` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut storage: Storage<Position> = Storage::new();
/// storage.emplace(entity, Position::new(1.0, 2.0, 3.0))?;
/// ```
#[derive(Debug)]
pub struct Storage<T: Component> {
    /// Entity membership and packed order.
    set: SparseSet,
    /// Component values, parallel to `set.packed()`.
    components: Vec<T>,
    /// Fired after a component is added.
    on_construct: Signal,
    /// Fired before a component is removed.
    on_destroy: Signal,
}

impl<T: Component> Default for Storage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> Storage<T> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_set(SparseSet::new())
    }

    /// Creates an empty storage whose sparse set uses `page_size` pages.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self::with_set(SparseSet::with_page_size(page_size))
    }

    fn with_set(set: SparseSet) -> Self {
        Self {
            set,
            components: Vec::new(),
            on_construct: Signal::default(),
            on_destroy: Signal::default(),
        }
    }

    /// Returns the number of stored components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the underlying sparse set.
    #[inline]
    #[must_use]
    pub fn set(&self) -> &SparseSet {
        &self.set
    }

    /// Checks whether `entity` has a component here.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.set.contains(entity)
    }

    /// Returns the dense position of `entity`'s component.
    #[inline]
    #[must_use]
    pub fn index(&self, entity: EntityId) -> Option<usize> {
        self.set.index(entity)
    }

    /// Adds a component for `entity`.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponent`] if `entity` already has one,
    /// [`EcsError::InvalidEntity`] for the null ID.
    pub fn emplace(&mut self, entity: EntityId, component: T) -> EcsResult<&mut T> {
        let position = self.set.add(entity).map_err(|error| match error {
            EcsError::AlreadyPresent(entity) => EcsError::DuplicateComponent {
                entity,
                component: type_name::<T>(),
            },
            other => other,
        })?;
        self.components.push(component);
        Ok(&mut self.components[position])
    }

    /// Removes and returns `entity`'s component.
    ///
    /// The last component is swapped into the freed position.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if `entity` has none.
    pub fn remove(&mut self, entity: EntityId) -> EcsResult<T> {
        let position = self.set.remove(entity).map_err(|_| self.missing(entity))?;
        Ok(self.components.swap_remove(position))
    }

    /// Gets `entity`'s component.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.set.index(entity).map(|position| &self.components[position])
    }

    /// Gets `entity`'s component mutably.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.set
            .index(entity)
            .map(|position| &mut self.components[position])
    }

    /// Returns the packed entity IDs.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        self.set.packed()
    }

    /// Returns the dense component array.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[T] {
        &self.components
    }

    /// Returns the dense component array mutably.
    ///
    /// Values can change; membership and order cannot.
    #[inline]
    pub fn components_mut(&mut self) -> &mut [T] {
        &mut self.components
    }

    /// Iterates over `(entity, component)` pairs in packed order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.set.iter().zip(self.components.iter())
    }

    /// Iterates mutably over `(entity, component)` pairs in packed order.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.set.iter().zip(self.components.iter_mut())
    }

    /// Returns the component at a dense position.
    #[inline]
    pub(crate) fn component_at_mut(&mut self, position: usize) -> Option<&mut T> {
        self.components.get_mut(position)
    }

    /// Creation notification point.
    pub fn on_construct(&mut self) -> Sink<'_> {
        self.on_construct.sink()
    }

    /// Destruction notification point.
    pub fn on_destroy(&mut self) -> Sink<'_> {
        self.on_destroy.sink()
    }

    fn missing(&self, entity: EntityId) -> EcsError {
        EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        }
    }
}

/// Type-erased interface the registry uses to drive every pool.
pub trait AnyPool: Send {
    /// Type name of the stored component.
    fn component_name(&self) -> &'static str;

    /// The pool's sparse set.
    fn sparse_set(&self) -> &SparseSet;

    /// Checks whether `entity` has a component in this pool.
    fn contains(&self, entity: EntityId) -> bool {
        self.sparse_set().contains(entity)
    }

    /// Number of stored components.
    fn len(&self) -> usize {
        self.sparse_set().len()
    }

    /// Returns `true` if the pool is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and drops `entity`'s component.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if `entity` has none.
    fn remove_entity(&mut self, entity: EntityId) -> EcsResult<()>;

    /// Exchanges two dense positions in both arrays.
    fn swap_positions(&mut self, first: usize, second: usize);

    /// One of the pool's notification points.
    fn signal_mut(&mut self, kind: SignalKind) -> &mut Signal;

    /// Upcast for downcasting to the concrete storage.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete storage.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyPool for Storage<T> {
    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn sparse_set(&self) -> &SparseSet {
        &self.set
    }

    fn remove_entity(&mut self, entity: EntityId) -> EcsResult<()> {
        self.remove(entity).map(drop)
    }

    fn swap_positions(&mut self, first: usize, second: usize) {
        self.set.swap_positions(first, second);
        self.components.swap(first, second);
    }

    fn signal_mut(&mut self, kind: SignalKind) -> &mut Signal {
        match kind {
            SignalKind::Construct => &mut self.on_construct,
            SignalKind::Destroy => &mut self.on_destroy,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcasts a type-erased pool to its concrete storage.
pub(crate) fn downcast_ref<T: Component>(pool: &dyn AnyPool) -> &Storage<T> {
    pool.as_any()
        .downcast_ref::<Storage<T>>()
        .expect("Pool registered under a different component type")
}

/// Downcasts a type-erased pool to its concrete storage, mutably.
pub(crate) fn downcast_mut<T: Component>(pool: &mut Box<dyn AnyPool>) -> &mut Storage<T> {
    pool.as_any_mut()
        .downcast_mut::<Storage<T>>()
        .expect("Pool registered under a different component type")
}
