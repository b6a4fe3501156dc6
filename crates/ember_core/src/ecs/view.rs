//! # Views
//!
//! Uncached queries over the pools of a registry.
//!
//! A view is built fresh on every call and holds no state of its own. It
//! walks the packed order of the smallest required pool and skips every
//! entity that is missing from another required pool or present in an
//! excluded one.
//!
//! ```rust,ignore
//! registry
//!     .view::<(Position, Velocity)>()
//!     .each(|_, position, velocity| position.x += velocity.x);
//! ```

use std::marker::PhantomData;

use super::component::{Component, ComponentId, ComponentSet};
use super::entity::EntityId;
use super::storage::{downcast_mut, AnyPool, Storage};

/// Borrows the pools at `required` mutably and those at `shared` immutably.
///
/// Both outputs follow the order of their ID lists. Returns `None` if an ID
/// repeats, appears in both lists, or has no pool.
pub(crate) fn split_pools<'a>(
    pools: &'a mut [Box<dyn AnyPool>],
    required: &[ComponentId],
    shared: &[ComponentId],
) -> Option<(Vec<&'a mut Box<dyn AnyPool>>, Vec<&'a Box<dyn AnyPool>>)> {
    let mut required_slots: Vec<Option<&'a mut Box<dyn AnyPool>>> =
        required.iter().map(|_| None).collect();
    let mut shared_slots: Vec<Option<&'a Box<dyn AnyPool>>> = vec![None; shared.len()];

    for (index, pool) in pools.iter_mut().enumerate() {
        let id = ComponentId::from_index(index);
        let mut in_required = required.iter().enumerate().filter(|&(_, &other)| other == id);
        let mut in_shared = shared.iter().enumerate().filter(|&(_, &other)| other == id);

        match (in_required.next(), in_shared.next()) {
            (Some(_), Some(_)) => return None,
            (Some((slot, _)), None) => {
                if in_required.next().is_some() {
                    return None;
                }
                required_slots[slot] = Some(pool);
            }
            (None, Some((slot, _))) => {
                if in_shared.next().is_some() {
                    return None;
                }
                shared_slots[slot] = Some(&*pool);
            }
            (None, None) => {}
        }
    }

    let required = required_slots.into_iter().collect::<Option<Vec<_>>>()?;
    let shared = shared_slots.into_iter().collect::<Option<Vec<_>>>()?;
    Some((required, shared))
}

/// An on-demand query over `Q`'s pools.
///
/// # Type Parameters
///
/// * `Q` - Tuple of required component types
pub struct View<'w, Q: ComponentSet> {
    /// Required pools, in `Q` order.
    pools: Vec<&'w mut Box<dyn AnyPool>>,
    excluded: Vec<&'w Box<dyn AnyPool>>,
    /// Slot of the smallest required pool.
    lead: usize,
    _marker: PhantomData<Q>,
}

impl<'w, Q: ComponentSet> View<'w, Q> {
    /// # Panics
    ///
    /// Panics if `required` is empty, names a component twice, or shares a
    /// component with `excluded`.
    pub(crate) fn new(
        pools: &'w mut [Box<dyn AnyPool>],
        required: &[ComponentId],
        excluded: &[ComponentId],
    ) -> Self {
        assert!(!required.is_empty(), "A view needs at least one component");
        let Some((pools, excluded)) = split_pools(pools, required, excluded) else {
            panic!("A view cannot name a component twice or both require and exclude it");
        };

        let lead = pools
            .iter()
            .enumerate()
            .min_by_key(|(_, pool)| pool.len())
            .map_or(0, |(slot, _)| slot);

        Self {
            pools,
            excluded,
            lead,
            _marker: PhantomData,
        }
    }

    /// Size of the smallest required pool.
    ///
    /// An upper bound on the number of matches, not the exact count.
    #[inline]
    #[must_use]
    pub fn estimated_len(&self) -> usize {
        self.pools[self.lead].len()
    }

    /// Returns `true` if the smallest required pool is empty.
    ///
    /// A `false` result does not guarantee that anything matches.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.estimated_len() == 0
    }

    /// Checks whether `entity` matches the view.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.pools.iter().all(|pool| pool.contains(entity))
            && !self.excluded.iter().any(|pool| pool.contains(entity))
    }

    /// Iterates over matching entities.
    ///
    /// The order is the packed order of the smallest pool and changes with
    /// any mutation of it.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.pools[self.lead]
            .sparse_set()
            .iter()
            .filter(move |&entity| self.contains(entity))
    }

    /// Gets a component of a matching entity.
    ///
    /// Returns `None` if `entity` does not match or `T` is not queried.
    #[must_use]
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        if !self.contains(entity) {
            return None;
        }
        self.pools
            .iter()
            .find_map(|pool| pool.as_any().downcast_ref::<Storage<T>>())?
            .get(entity)
    }

    /// Gets a component of a matching entity mutably.
    ///
    /// Returns `None` if `entity` does not match or `T` is not queried.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        if !self.contains(entity) {
            return None;
        }
        self.pools
            .iter_mut()
            .find_map(|pool| pool.as_any_mut().downcast_mut::<Storage<T>>())?
            .get_mut(entity)
    }

    /// Fetches every queried component of a matching entity.
    pub fn fetch(&mut self, entity: EntityId) -> Option<Q::RefsMut<'_>> {
        if !self.contains(entity) {
            return None;
        }
        Q::fetch_mut(self.pools.iter_mut().map(|pool| &mut **pool), entity)
    }

    /// Like [`fetch`](Self::fetch), consuming the view to return references
    /// that live as long as the registry borrow.
    pub fn into_fetch(self, entity: EntityId) -> Option<Q::RefsMut<'w>> {
        if !self.contains(entity) {
            return None;
        }
        Q::fetch_mut(self.pools.into_iter(), entity)
    }
}

macro_rules! impl_view_each {
    ($($name:ident),+) => {
        impl<'w, $($name: Component),+> View<'w, ($($name,)+)> {
            /// Calls `func` with every matching entity and its components.
            #[allow(non_snake_case)]
            pub fn each<Func>(&mut self, mut func: Func)
            where
                Func: FnMut(EntityId, $(&mut $name),+),
            {
                for position in 0..self.estimated_len() {
                    let Some(entity) = self.pools[self.lead].sparse_set().at(position) else {
                        break;
                    };
                    if !self.contains(entity) {
                        continue;
                    }
                    let mut pools = self.pools.iter_mut();
                    $(
                        let $name = downcast_mut::<$name>(
                            &mut **pools.next().expect("One pool per queried component"),
                        )
                        .get_mut(entity)
                        .expect("View match without a queried component");
                    )+
                    func(entity, $($name),+);
                }
            }
        }
    };
}

impl_view_each!(A);
impl_view_each!(A, B);
impl_view_each!(A, B, C);
impl_view_each!(A, B, C, D);
impl_view_each!(A, B, C, D, E);
impl_view_each!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Mass(u32);
    impl Component for Mass {}

    #[derive(Debug, PartialEq)]
    struct Charge(i32);
    impl Component for Charge {}

    fn id(raw: u32) -> EntityId {
        EntityId::from_raw(raw)
    }

    fn pools() -> Vec<Box<dyn AnyPool>> {
        let mut mass = Storage::<Mass>::new();
        let mut charge = Storage::<Charge>::new();
        mass.emplace(id(1), Mass(10)).unwrap();
        mass.emplace(id(2), Mass(20)).unwrap();
        charge.emplace(id(2), Charge(-1)).unwrap();
        charge.emplace(id(3), Charge(1)).unwrap();
        vec![Box::new(mass), Box::new(charge)]
    }

    #[test]
    fn test_split_pools_orders_by_request() {
        let mut pools = pools();
        let (required, shared) = split_pools(
            &mut pools,
            &[ComponentId::from_index(1), ComponentId::from_index(0)],
            &[],
        )
        .unwrap();
        assert!(shared.is_empty());
        assert!(required[0].component_name().ends_with("Charge"));
        assert!(required[1].component_name().ends_with("Mass"));
    }

    #[test]
    fn test_split_pools_rejects_aliasing() {
        let mut pools = pools();
        let first = ComponentId::from_index(0);
        assert!(split_pools(&mut pools, &[first, first], &[]).is_none());
        assert!(split_pools(&mut pools, &[first], &[first]).is_none());
        assert!(split_pools(&mut pools, &[ComponentId::from_index(7)], &[]).is_none());
    }

    #[test]
    fn test_view_intersects_pools() {
        let mut pools = pools();
        let mut view: View<'_, (Mass, Charge)> = View::new(
            &mut pools,
            &[ComponentId::from_index(0), ComponentId::from_index(1)],
            &[],
        );

        assert_eq!(view.iter().collect::<Vec<_>>(), vec![id(2)]);
        assert_eq!(view.estimated_len(), 2);
        assert_eq!(view.get::<Mass>(id(1)), None);

        let mut seen = Vec::new();
        view.each(|entity, mass, charge| {
            mass.0 += 1;
            seen.push((entity, charge.0));
        });
        assert_eq!(seen, vec![(id(2), -1)]);
        assert_eq!(view.get::<Mass>(id(2)), Some(&Mass(21)));
    }

    #[test]
    fn test_view_exclusion() {
        let mut pools = pools();
        let view: View<'_, (Mass,)> = View::new(
            &mut pools,
            &[ComponentId::from_index(0)],
            &[ComponentId::from_index(1)],
        );
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![id(1)]);
        assert!(!view.contains(id(2)));
    }

    #[test]
    #[should_panic(expected = "twice")]
    fn test_view_panics_on_require_and_exclude() {
        let mut pools = pools();
        let _view: View<'_, (Mass,)> = View::new(
            &mut pools,
            &[ComponentId::from_index(0)],
            &[ComponentId::from_index(0)],
        );
    }
}
