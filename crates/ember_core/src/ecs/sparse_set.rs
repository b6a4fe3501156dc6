//! # Sparse Set
//!
//! Ordered set of entity IDs with O(1) add, remove and lookup.
//!
//! ```text
//! sparse (paged):  page 0: [ 2, -, 0, -, ...]   page 1: (never touched)
//! packed:          [ e2, e5, e0 ]
//! ```
//!
//! The sparse table is split into fixed-size pages that are allocated the
//! first time an ID inside them is stored, so memory grows with the highest
//! page touched rather than with the theoretical ID range.

use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};

/// Default number of sparse slots per page.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Marks an empty sparse slot.
const TOMBSTONE: u32 = u32::MAX;

/// Paged sparse set of entity IDs.
///
/// Invariant: for every contained `e`, `packed[index(e)] == e`.
#[derive(Clone, Debug)]
pub struct SparseSet {
    /// Lazily allocated pages mapping entity index to packed position.
    sparse: Vec<Option<Box<[u32]>>>,
    /// Present IDs, densely packed.
    packed: Vec<EntityId>,
    /// Slots per page (power of two).
    page_size: usize,
    /// `log2(page_size)`.
    page_shift: u32,
}

impl Default for SparseSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseSet {
    /// Creates an empty set with [`DEFAULT_PAGE_SIZE`] pages.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty set with the given page size.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        assert!(
            page_size.is_power_of_two(),
            "Page size must be a power of two"
        );

        Self {
            sparse: Vec::new(),
            packed: Vec::new(),
            page_size,
            page_shift: page_size.trailing_zeros(),
        }
    }

    /// Returns the number of contained IDs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.packed.len()
    }

    /// Returns `true` if the set is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }

    /// Returns the number of sparse slots per page.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of sparse pages currently allocated.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.sparse.iter().filter(|page| page.is_some()).count()
    }

    /// Returns the packed IDs in iteration order.
    #[inline]
    #[must_use]
    pub fn packed(&self) -> &[EntityId] {
        &self.packed
    }

    /// Iterates over the contained IDs in packed order.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = EntityId> + '_ {
        self.packed.iter().copied()
    }

    /// Returns the ID stored at a packed position.
    #[inline]
    #[must_use]
    pub fn at(&self, position: usize) -> Option<EntityId> {
        self.packed.get(position).copied()
    }

    #[inline]
    fn locate(&self, entity: EntityId) -> (usize, usize) {
        let index = entity.index();
        (index >> self.page_shift, index & (self.page_size - 1))
    }

    /// Returns the packed position of `entity`, if present.
    #[inline]
    #[must_use]
    pub fn index(&self, entity: EntityId) -> Option<usize> {
        if entity.is_null() {
            return None;
        }
        let (page, offset) = self.locate(entity);
        let slot = *self.sparse.get(page)?.as_ref()?.get(offset)?;
        (slot != TOMBSTONE).then_some(slot as usize)
    }

    /// Checks whether `entity` is in the set.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.index(entity).is_some()
    }

    /// Returns the sparse slot for `entity`, allocating its page on demand.
    fn slot_mut(&mut self, entity: EntityId) -> &mut u32 {
        let (page, offset) = self.locate(entity);
        if page >= self.sparse.len() {
            self.sparse.resize_with(page + 1, || None);
        }
        let page_size = self.page_size;
        let page = self.sparse[page]
            .get_or_insert_with(|| vec![TOMBSTONE; page_size].into_boxed_slice());
        &mut page[offset]
    }

    /// Appends `entity`, returning its packed position.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] for the null ID,
    /// [`EcsError::AlreadyPresent`] if the set already contains it.
    pub fn add(&mut self, entity: EntityId) -> EcsResult<usize> {
        if entity.is_null() {
            return Err(EcsError::InvalidEntity(entity));
        }
        if self.contains(entity) {
            return Err(EcsError::AlreadyPresent(entity));
        }

        // At most one slot per non-null ID, so positions stay below TOMBSTONE.
        let position = self.packed.len();
        *self.slot_mut(entity) = position as u32;
        self.packed.push(entity);
        Ok(position)
    }

    /// Removes `entity` by swapping it with the last packed element.
    ///
    /// Returns the position the entity occupied; the former last element
    /// now lives there.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotPresent`] if the set does not contain `entity`.
    pub fn remove(&mut self, entity: EntityId) -> EcsResult<usize> {
        let position = self.index(entity).ok_or(EcsError::NotPresent(entity))?;

        self.packed.swap_remove(position);
        if let Some(&moved) = self.packed.get(position) {
            *self.slot_mut(moved) = position as u32;
        }
        *self.slot_mut(entity) = TOMBSTONE;

        Ok(position)
    }

    /// Exchanges the packed positions of two contained IDs.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotPresent`] if either ID is absent.
    pub fn swap(&mut self, a: EntityId, b: EntityId) -> EcsResult<()> {
        let first = self.index(a).ok_or(EcsError::NotPresent(a))?;
        let second = self.index(b).ok_or(EcsError::NotPresent(b))?;
        self.swap_positions(first, second);
        Ok(())
    }

    /// Exchanges two packed positions and fixes both sparse entries.
    ///
    /// # Panics
    ///
    /// Panics if either position is out of bounds.
    pub fn swap_positions(&mut self, first: usize, second: usize) {
        if first == second {
            return;
        }
        self.packed.swap(first, second);
        let (a, b) = (self.packed[first], self.packed[second]);
        *self.slot_mut(a) = first as u32;
        *self.slot_mut(b) = second as u32;
    }

    /// Reserves room for `additional` more packed IDs.
    pub fn reserve(&mut self, additional: usize) {
        self.packed.reserve(additional);
    }

    /// Removes every ID and releases all sparse pages.
    pub fn clear(&mut self) {
        self.sparse.clear();
        self.packed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> EntityId {
        EntityId::from_raw(raw)
    }

    fn assert_consistent(set: &SparseSet) {
        for (position, &entity) in set.packed().iter().enumerate() {
            assert_eq!(set.index(entity), Some(position));
        }
    }

    #[test]
    fn test_add_contains() {
        let mut set = SparseSet::new();
        assert_eq!(set.add(id(3)).unwrap(), 0);
        assert_eq!(set.add(id(7)).unwrap(), 1);

        assert!(set.contains(id(3)));
        assert!(set.contains(id(7)));
        assert!(!set.contains(id(4)));
        assert_eq!(set.len(), 2);
        assert_consistent(&set);
    }

    #[test]
    fn test_add_rejects_duplicates_and_null() {
        let mut set = SparseSet::new();
        set.add(id(1)).unwrap();
        assert_eq!(set.add(id(1)), Err(EcsError::AlreadyPresent(id(1))));
        assert_eq!(
            set.add(EntityId::NULL),
            Err(EcsError::InvalidEntity(EntityId::NULL))
        );
    }

    #[test]
    fn test_remove_swaps_last_into_place() {
        let mut set = SparseSet::new();
        for raw in [10, 20, 30, 40] {
            set.add(id(raw)).unwrap();
        }

        assert_eq!(set.remove(id(20)).unwrap(), 1);
        assert_eq!(set.packed(), &[id(10), id(40), id(30)]);
        assert!(!set.contains(id(20)));
        assert_consistent(&set);

        // Removing the last element moves nothing.
        assert_eq!(set.remove(id(30)).unwrap(), 2);
        assert_eq!(set.packed(), &[id(10), id(40)]);
        assert_consistent(&set);

        assert_eq!(set.remove(id(30)), Err(EcsError::NotPresent(id(30))));
    }

    #[test]
    fn test_swap_preserves_mapping() {
        let mut set = SparseSet::new();
        for raw in 0..5 {
            set.add(id(raw)).unwrap();
        }
        set.swap(id(0), id(4)).unwrap();
        assert_eq!(set.at(0), Some(id(4)));
        assert_eq!(set.at(4), Some(id(0)));
        assert_consistent(&set);

        assert_eq!(set.swap(id(0), id(9)), Err(EcsError::NotPresent(id(9))));
    }

    #[test]
    fn test_pages_allocated_lazily() {
        let mut set = SparseSet::with_page_size(64);
        assert_eq!(set.page_count(), 0);

        set.add(id(5)).unwrap();
        assert_eq!(set.page_count(), 1);

        // Far away ID touches exactly one more page.
        set.add(id(64 * 1000 + 3)).unwrap();
        assert_eq!(set.page_count(), 2);
        assert!(set.contains(id(64 * 1000 + 3)));
        assert!(!set.contains(id(64 * 999)));
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut set = SparseSet::with_page_size(16);
        for raw in 0..40 {
            set.add(id(raw)).unwrap();
        }
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.page_count(), 0);
        assert!(!set.contains(id(3)));
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_page_size_must_be_power_of_two() {
        let _ = SparseSet::with_page_size(100);
    }
}
