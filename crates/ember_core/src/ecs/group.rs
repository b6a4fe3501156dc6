//! # Groups
//!
//! Cached queries kept up to date by component signals.
//!
//! ## Non-owning groups
//!
//! Track their matches in a private [`SparseSet`]. Membership changes are a
//! single add or remove.
//!
//! ## Owning groups
//!
//! Repartition the pools they own so that the matches occupy the prefix
//! `[0, len)` of every owned pool, in the same order in all of them:
//!
//! ```text
//! Position pool:  [ e3, e7, e1 | e4, e9 ]
//! Velocity pool:  [ e3, e7, e1 | e2 ]
//!                   ^^^^^^^^^^   len = 3
//! ```
//!
//! Iteration over owned components is then a walk over dense arrays with no
//! lookups at all. Two owning groups may share pools only when one is nested
//! in the other; the nested one keeps its matches in a prefix of the broader
//! one's prefix.

use std::marker::PhantomData;

use super::component::{Component, ComponentId, ComponentSet};
use super::entity::EntityId;
use super::sparse_set::SparseSet;
use super::storage::{downcast_mut, AnyPool};
use crate::error::{EcsError, EcsResult};

/// Index of a group in its registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct GroupId(u32);

impl GroupId {
    #[inline]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque handle to a group built by a registry.
///
/// Only meaningful for the registry that returned it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupHandle(pub(crate) GroupId);

/// The sorted component sets that identify a group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupSignature {
    owned: Vec<ComponentId>,
    get: Vec<ComponentId>,
    exclude: Vec<ComponentId>,
    /// `owned ∪ get`, sorted.
    required: Vec<ComponentId>,
}

fn normalize(mut ids: Vec<ComponentId>, role: &str) -> EcsResult<Vec<ComponentId>> {
    ids.sort_unstable();
    if ids.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(EcsError::InvalidGroup(format!(
            "component listed twice among {role} types"
        )));
    }
    Ok(ids)
}

/// Both slices must be sorted.
fn is_subset(subset: &[ComponentId], superset: &[ComponentId]) -> bool {
    subset.iter().all(|id| superset.binary_search(id).is_ok())
}

fn overlaps(a: &[ComponentId], b: &[ComponentId]) -> bool {
    a.iter().any(|id| b.binary_search(id).is_ok())
}

impl GroupSignature {
    /// Builds a signature from owned, observed and excluded IDs in any order.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidGroup`] if a list repeats an ID, if the lists are
    /// not pairwise disjoint, or if nothing is owned or observed.
    pub fn new(
        owned: Vec<ComponentId>,
        get: Vec<ComponentId>,
        exclude: Vec<ComponentId>,
    ) -> EcsResult<Self> {
        let owned = normalize(owned, "owned")?;
        let get = normalize(get, "observed")?;
        let exclude = normalize(exclude, "excluded")?;

        if owned.is_empty() && get.is_empty() {
            return Err(EcsError::InvalidGroup(
                "a group needs at least one owned or observed component".to_owned(),
            ));
        }
        if overlaps(&owned, &get) || overlaps(&owned, &exclude) || overlaps(&get, &exclude) {
            return Err(EcsError::InvalidGroup(
                "owned, observed and excluded components must be disjoint".to_owned(),
            ));
        }

        let mut required: Vec<ComponentId> = owned.iter().chain(&get).copied().collect();
        required.sort_unstable();

        Ok(Self {
            owned,
            get,
            exclude,
            required,
        })
    }

    /// Owned component IDs, sorted.
    #[inline]
    #[must_use]
    pub fn owned(&self) -> &[ComponentId] {
        &self.owned
    }

    /// Observed but not owned component IDs, sorted.
    #[inline]
    #[must_use]
    pub fn get(&self) -> &[ComponentId] {
        &self.get
    }

    /// Excluded component IDs, sorted.
    #[inline]
    #[must_use]
    pub fn exclude(&self) -> &[ComponentId] {
        &self.exclude
    }

    /// Owned and observed IDs together, sorted.
    #[inline]
    #[must_use]
    pub fn required(&self) -> &[ComponentId] {
        &self.required
    }

    /// Returns `true` if the group owns at least one pool.
    #[inline]
    #[must_use]
    pub fn is_owning(&self) -> bool {
        !self.owned.is_empty()
    }

    /// Returns `true` if a match must have `id`.
    #[inline]
    #[must_use]
    pub fn requires(&self, id: ComponentId) -> bool {
        self.required.binary_search(&id).is_ok()
    }

    /// Returns `true` if a match must not have `id`.
    #[inline]
    #[must_use]
    pub fn excludes(&self, id: ComponentId) -> bool {
        self.exclude.binary_search(&id).is_ok()
    }

    /// Returns `true` if the group reorders the pool of `id`.
    #[inline]
    #[must_use]
    pub fn owns(&self, id: ComponentId) -> bool {
        self.owned.binary_search(&id).is_ok()
    }

    /// Returns `true` if changes to `id` can affect membership.
    #[inline]
    #[must_use]
    pub fn observes(&self, id: ComponentId) -> bool {
        self.requires(id) || self.excludes(id)
    }

    /// Returns `true` if every match of `self` is also a match of `broader`
    /// and `self` owns everything `broader` owns.
    #[must_use]
    pub fn is_nested_in(&self, broader: &Self) -> bool {
        is_subset(&broader.owned, &self.owned)
            && is_subset(&broader.required, &self.required)
            && is_subset(&broader.exclude, &self.exclude)
    }

    /// First owned ID both signatures claim, if any.
    pub(crate) fn shared_owned(&self, other: &Self) -> Option<ComponentId> {
        self.owned
            .iter()
            .copied()
            .find(|id| other.owned.binary_search(id).is_ok())
    }

    /// Every observed ID, required ones first.
    pub(crate) fn observed(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.required.iter().chain(&self.exclude).copied()
    }

    /// Checks the membership condition against the pools.
    ///
    /// `ignoring` names an excluded component that is about to be removed.
    pub(crate) fn matches(
        &self,
        pools: &[Box<dyn AnyPool>],
        entity: EntityId,
        ignoring: Option<ComponentId>,
    ) -> bool {
        self.required
            .iter()
            .all(|id| pools[id.index()].contains(entity))
            && self
                .exclude
                .iter()
                .all(|&id| Some(id) == ignoring || !pools[id.index()].contains(entity))
    }
}

/// How a group stores its matches.
#[derive(Debug)]
pub(crate) enum Membership {
    /// Matches are `[0, len)` of every owned pool.
    Owning { len: usize },
    /// Matches are tracked in a private set.
    Tracking { set: SparseSet },
}

/// A group as stored in the registry.
#[derive(Debug)]
pub(crate) struct GroupData {
    pub(crate) signature: GroupSignature,
    pub(crate) membership: Membership,
}

/// Swaps `entity` to position `len` in every owned pool and grows the prefix.
fn pull_into_prefix(
    owned: &[ComponentId],
    pools: &mut [Box<dyn AnyPool>],
    entity: EntityId,
    len: &mut usize,
) {
    for id in owned {
        let pool = &mut pools[id.index()];
        let position = pool
            .sparse_set()
            .index(entity)
            .expect("Owned pool lost a group member");
        pool.swap_positions(position, *len);
    }
    *len += 1;
}

impl GroupData {
    pub(crate) fn new(signature: GroupSignature, page_size: usize) -> Self {
        let membership = if signature.is_owning() {
            Membership::Owning { len: 0 }
        } else {
            Membership::Tracking {
                set: SparseSet::with_page_size(page_size),
            }
        };
        Self {
            signature,
            membership,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match &self.membership {
            Membership::Owning { len } => *len,
            Membership::Tracking { set } => set.len(),
        }
    }

    /// Pool whose packed order lists an owning group's matches first.
    fn lead(&self) -> ComponentId {
        self.signature.owned[0]
    }

    pub(crate) fn contains(&self, pools: &[Box<dyn AnyPool>], entity: EntityId) -> bool {
        match &self.membership {
            Membership::Owning { len } => pools[self.lead().index()]
                .sparse_set()
                .index(entity)
                .is_some_and(|position| position < *len),
            Membership::Tracking { set } => set.contains(entity),
        }
    }

    /// Matching entities, contiguous.
    pub(crate) fn entities<'a>(&'a self, pools: &'a [Box<dyn AnyPool>]) -> &'a [EntityId] {
        match &self.membership {
            Membership::Owning { len } => &pools[self.lead().index()].sparse_set().packed()[..*len],
            Membership::Tracking { set } => set.packed(),
        }
    }

    /// Adds `entity` if it matches and is not already a member.
    pub(crate) fn admit(
        &mut self,
        pools: &mut [Box<dyn AnyPool>],
        entity: EntityId,
        ignoring: Option<ComponentId>,
    ) {
        if self.contains(pools, entity) || !self.signature.matches(pools, entity, ignoring) {
            return;
        }
        match &mut self.membership {
            Membership::Owning { len } => {
                pull_into_prefix(&self.signature.owned, pools, entity, len);
            }
            Membership::Tracking { set } => {
                let added = set.add(entity);
                debug_assert!(added.is_ok());
            }
        }
    }

    /// Removes `entity` if it is a member.
    pub(crate) fn discard(&mut self, pools: &mut [Box<dyn AnyPool>], entity: EntityId) {
        if !self.contains(pools, entity) {
            return;
        }
        match &mut self.membership {
            Membership::Owning { len } => {
                let last = *len - 1;
                for id in &self.signature.owned {
                    let pool = &mut pools[id.index()];
                    let position = pool
                        .sparse_set()
                        .index(entity)
                        .expect("Owned pool lost a group member");
                    pool.swap_positions(position, last);
                }
                *len = last;
            }
            Membership::Tracking { set } => {
                let removed = set.remove(entity);
                debug_assert!(removed.is_ok());
            }
        }
    }

    /// Collects every entity that already matches.
    pub(crate) fn populate(&mut self, pools: &mut [Box<dyn AnyPool>]) {
        match &mut self.membership {
            Membership::Owning { len } => {
                let lead = self.signature.owned[0].index();
                for position in 0..pools[lead].len() {
                    let Some(entity) = pools[lead].sparse_set().at(position) else {
                        break;
                    };
                    if self.signature.matches(pools, entity, None) {
                        pull_into_prefix(&self.signature.owned, pools, entity, len);
                    }
                }
            }
            Membership::Tracking { set } => {
                let Some(driver) = self
                    .signature
                    .required
                    .iter()
                    .min_by_key(|id| pools[id.index()].len())
                else {
                    return;
                };
                for entity in pools[driver.index()].sparse_set().iter() {
                    if self.signature.matches(pools, entity, None) {
                        let added = set.add(entity);
                        debug_assert!(added.is_ok());
                    }
                }
            }
        }
    }
}

/// Where a group view reads its member list from.
#[derive(Clone, Copy)]
pub(crate) enum Driver<'w> {
    /// Prefix of the queried owned pool at this slot.
    Owned { slot: usize },
    /// Prefix of an owned pool that is not part of the query.
    Lead(&'w SparseSet),
    /// Membership set of a non-owning group.
    Tracked(&'w SparseSet),
}

/// Iteration access to one group's members and their components.
///
/// Obtained from [`Registry::group_view`](super::Registry::group_view).
/// Owned components are read by position, observed ones by lookup.
pub struct GroupView<'w, Q: ComponentSet> {
    pools: Vec<&'w mut Box<dyn AnyPool>>,
    /// Per queried type: read by position instead of by lookup.
    direct: Vec<bool>,
    driver: Driver<'w>,
    len: usize,
    _marker: PhantomData<Q>,
}

impl<'w, Q: ComponentSet> GroupView<'w, Q> {
    pub(crate) fn new(
        pools: Vec<&'w mut Box<dyn AnyPool>>,
        direct: Vec<bool>,
        driver: Driver<'w>,
        len: usize,
    ) -> Self {
        Self {
            pools,
            direct,
            driver,
            len,
            _marker: PhantomData,
        }
    }

    /// Returns the number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the group has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Members in iteration order.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        match self.driver {
            Driver::Owned { slot } => &self.pools[slot].sparse_set().packed()[..self.len],
            Driver::Lead(set) => &set.packed()[..self.len],
            Driver::Tracked(set) => set.packed(),
        }
    }

    /// Iterates over the members.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities().iter().copied()
    }

    /// Checks whether `entity` is a member.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        let prefix = |set: &SparseSet| set.index(entity).is_some_and(|position| position < self.len);
        match self.driver {
            Driver::Owned { slot } => prefix(self.pools[slot].sparse_set()),
            Driver::Lead(set) => prefix(set),
            Driver::Tracked(set) => set.contains(entity),
        }
    }

    /// Fetches a member's queried components, in query order.
    ///
    /// Returns `None` if `entity` is not a member.
    pub fn fetch(&mut self, entity: EntityId) -> Option<Q::RefsMut<'_>> {
        if !self.contains(entity) {
            return None;
        }
        Q::fetch_mut(self.pools.iter_mut().map(|pool| &mut **pool), entity)
    }

    #[inline]
    fn entity_at(&self, position: usize) -> EntityId {
        self.entities()[position]
    }
}

macro_rules! impl_group_each {
    ($($name:ident),+) => {
        impl<'w, $($name: Component),+> GroupView<'w, ($($name,)+)> {
            /// Calls `func` with every member and its components.
            ///
            /// Owned components are addressed by position.
            #[allow(non_snake_case)]
            pub fn each<Func>(&mut self, mut func: Func)
            where
                Func: FnMut(EntityId, $(&mut $name),+),
            {
                for position in 0..self.len {
                    let entity = self.entity_at(position);
                    let mut pools = self.pools.iter_mut().zip(self.direct.iter());
                    $(
                        let $name = {
                            let (pool, &direct) = pools
                                .next()
                                .expect("One pool per queried component");
                            let storage = downcast_mut::<$name>(&mut **pool);
                            let component = if direct {
                                storage.component_at_mut(position)
                            } else {
                                storage.get_mut(entity)
                            };
                            component.expect("Group member without a queried component")
                        };
                    )+
                    func(entity, $($name),+);
                }
            }
        }
    };
}

impl_group_each!(A);
impl_group_each!(A, B);
impl_group_each!(A, B, C);
impl_group_each!(A, B, C, D);
impl_group_each!(A, B, C, D, E);
impl_group_each!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[usize]) -> Vec<ComponentId> {
        raw.iter().copied().map(ComponentId::from_index).collect()
    }

    fn signature(owned: &[usize], get: &[usize], exclude: &[usize]) -> GroupSignature {
        GroupSignature::new(ids(owned), ids(get), ids(exclude)).unwrap()
    }

    #[test]
    fn test_signature_is_order_independent() {
        assert_eq!(signature(&[2, 0], &[5], &[]), signature(&[0, 2], &[5], &[]));
    }

    #[test]
    fn test_signature_rejects_malformed_requests() {
        let empty = GroupSignature::new(vec![], vec![], ids(&[1]));
        assert!(matches!(empty, Err(EcsError::InvalidGroup(_))));

        let repeated = GroupSignature::new(ids(&[1, 1]), vec![], vec![]);
        assert!(matches!(repeated, Err(EcsError::InvalidGroup(_))));

        let overlapping = GroupSignature::new(ids(&[1]), ids(&[2]), ids(&[1]));
        assert!(matches!(overlapping, Err(EcsError::InvalidGroup(_))));
    }

    #[test]
    fn test_signature_queries() {
        let sig = signature(&[0], &[1], &[2]);
        assert!(sig.is_owning());
        assert!(sig.owns(ComponentId::from_index(0)));
        assert!(!sig.owns(ComponentId::from_index(1)));
        assert!(sig.requires(ComponentId::from_index(1)));
        assert!(sig.excludes(ComponentId::from_index(2)));
        assert!(sig.observes(ComponentId::from_index(2)));
        assert!(!sig.observes(ComponentId::from_index(3)));
        assert_eq!(sig.observed().count(), 3);
    }

    #[test]
    fn test_nesting() {
        let broad = signature(&[0], &[], &[]);
        let narrow = signature(&[0, 1], &[], &[]);
        let with_get = signature(&[0], &[2], &[]);
        let sibling = signature(&[1, 2], &[], &[]);

        assert!(narrow.is_nested_in(&broad));
        assert!(!broad.is_nested_in(&narrow));
        assert!(with_get.is_nested_in(&broad));
        assert!(!sibling.is_nested_in(&narrow));
        assert!(!narrow.is_nested_in(&sibling));
        assert_eq!(narrow.shared_owned(&sibling), Some(ComponentId::from_index(1)));
        assert_eq!(broad.shared_owned(&sibling), None);
    }

    #[test]
    fn test_exclusion_narrows() {
        let open = signature(&[0], &[], &[]);
        let closed = signature(&[0], &[], &[3]);
        assert!(closed.is_nested_in(&open));
        assert!(!open.is_nested_in(&closed));
    }
}
