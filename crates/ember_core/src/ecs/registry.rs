//! # Registry
//!
//! The central container for entities, component pools and groups.
//!
//! ## Entities
//!
//! Slot `i` holds `EntityId(i)` while the entity is alive and `null` after it
//! is destroyed; freed slots are reused last-in first-out.
//!
//! ## Pools
//!
//! One [`Storage`] per component type, created the first time the type is
//! used and addressed by its [`ComponentId`].
//!
//! ## Groups
//!
//! Built on request and then maintained on every component change. The
//! directory keeps broader owning groups ahead of the groups nested in them:
//! removals walk it backwards, insertions forwards, so nested prefixes stay
//! inside the prefixes that contain them.

use std::any::type_name;
use std::fmt;

use super::component::{Component, ComponentId, ComponentIndex, ComponentSet};
use super::entity::EntityId;
use super::group::{Driver, GroupData, GroupHandle, GroupId, GroupSignature, GroupView, Membership};
use super::signal::{SignalKind, Sink};
use super::storage::{downcast_mut, downcast_ref, AnyPool, Storage};
use super::view::{split_pools, View};
use crate::config::RegistryConfig;
use crate::error::{EcsError, EcsResult};

/// Container of entities, their components and cached groups.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = Registry::new();
///
/// let entity = registry.create();
/// registry.emplace(entity, Position::new(1.0, 2.0, 3.0))?;
/// registry.emplace(entity, Velocity::new(0.5, 0.0, 0.0))?;
///
/// registry
///     .view::<(Position, Velocity)>()
///     .each(|_, position, velocity| position.x += velocity.x);
/// ```
pub struct Registry {
    config: RegistryConfig,
    /// `slots[i]` is `EntityId(i)` while alive, null otherwise.
    slots: Vec<EntityId>,
    /// Freed slot indices, reused last-in first-out.
    free_list: Vec<u32>,
    /// Number of alive entities.
    alive: usize,
    components: ComponentIndex,
    /// One pool per registered component, indexed by `ComponentId`.
    pools: Vec<Box<dyn AnyPool>>,
    /// Groups, indexed by `GroupId`.
    groups: Vec<GroupData>,
    /// Group IDs, broader owning groups before nested ones.
    directory: Vec<GroupId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("alive", &self.alive)
            .field("slots", &self.slots.len())
            .field("pools", &self.pools.len())
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(RegistryConfig::default())
    }

    /// Creates an empty registry.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the configuration does not validate.
    pub fn with_config(config: RegistryConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RegistryConfig) -> Self {
        Self {
            config,
            slots: Vec::with_capacity(config.entity_capacity),
            free_list: Vec::new(),
            alive: 0,
            components: ComponentIndex::default(),
            pools: Vec::new(),
            groups: Vec::new(),
            directory: Vec::new(),
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the component types registered so far.
    #[inline]
    #[must_use]
    pub fn component_index(&self) -> &ComponentIndex {
        &self.components
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity, reusing the most recently freed slot if any.
    ///
    /// # Panics
    ///
    /// Panics if all `u32::MAX` slots are in use.
    pub fn create(&mut self) -> EntityId {
        let entity = if let Some(index) = self.free_list.pop() {
            let entity = EntityId::from_raw(index);
            self.slots[entity.index()] = entity;
            entity
        } else {
            let index = self.slots.len();
            assert!(index < EntityId::NULL.index(), "Entity space exhausted");
            let entity = EntityId::from_raw(index as u32);
            self.slots.push(entity);
            entity
        };

        self.alive += 1;
        tracing::trace!("Created entity {}", entity);
        entity
    }

    /// Checks whether `entity` was created and not destroyed since.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: EntityId) -> bool {
        !entity.is_null() && self.slots.get(entity.index()) == Some(&entity)
    }

    #[inline]
    fn check(&self, entity: EntityId) -> EcsResult<()> {
        if self.is_valid(entity) {
            Ok(())
        } else {
            Err(EcsError::InvalidEntity(entity))
        }
    }

    /// Destroys `entity` after removing each of its components.
    ///
    /// Components go in pool registration order, each one firing its
    /// destruction signal.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive.
    pub fn destroy(&mut self, entity: EntityId) -> EcsResult<()> {
        self.check(entity)?;

        for index in 0..self.pools.len() {
            if self.pools[index].contains(entity) {
                let id = ComponentId::from_index(index);
                self.notify_destroy(id, entity);
                self.pools[index].remove_entity(entity)?;
            }
        }

        self.slots[entity.index()] = EntityId::NULL;
        self.free_list.push(entity.to_raw());
        self.alive -= 1;
        tracing::trace!("Destroyed entity {}", entity);
        Ok(())
    }

    /// Returns the number of alive entities.
    #[inline]
    #[must_use]
    pub fn alive(&self) -> usize {
        self.alive
    }

    /// Iterates over alive entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().copied().filter(|entity| !entity.is_null())
    }

    /// Returns `true` if `entity` has no components at all.
    #[must_use]
    pub fn is_orphan(&self, entity: EntityId) -> bool {
        !self.pools.iter().any(|pool| pool.contains(entity))
    }

    /// Destroys every alive entity.
    ///
    /// # Errors
    ///
    /// Propagates the first failed destruction.
    pub fn clear(&mut self) -> EcsResult<()> {
        let alive: Vec<EntityId> = self.entities().collect();
        for entity in alive {
            self.destroy(entity)?;
        }
        Ok(())
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Returns the ID of `T`, creating its pool on first use.
    pub(crate) fn assure<T: Component>(&mut self) -> ComponentId {
        let (id, fresh) = self.components.register::<T>();
        if fresh {
            self.pools
                .push(Box::new(Storage::<T>::with_page_size(self.config.page_size)));
            tracing::debug!("Registered component {} as #{}", type_name::<T>(), id.index());
        }
        id
    }

    fn missing<T: Component>(entity: EntityId) -> EcsError {
        EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        }
    }

    /// Attaches a component and fires its creation signal.
    ///
    /// # Arguments
    ///
    /// * `entity` - A live entity without a `T`
    /// * `value` - The component
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive,
    /// [`EcsError::DuplicateComponent`] if it already has a `T`.
    pub fn emplace<T: Component>(&mut self, entity: EntityId, value: T) -> EcsResult<&mut T> {
        self.check(entity)?;
        let id = self.assure::<T>();
        downcast_mut::<T>(&mut self.pools[id.index()]).emplace(entity, value)?;

        self.notify_construct(id, entity);

        // Owning groups may have moved the value.
        downcast_mut::<T>(&mut self.pools[id.index()])
            .get_mut(entity)
            .ok_or_else(|| Self::missing::<T>(entity))
    }

    /// Replaces an existing `T` in place, or attaches a new one.
    ///
    /// Replacement fires no signal.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive.
    pub fn emplace_or_replace<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> EcsResult<&mut T> {
        if self.has::<(T,)>(entity) {
            let slot = self.get_mut::<T>(entity)?;
            *slot = value;
            Ok(slot)
        } else {
            self.emplace(entity, value)
        }
    }

    /// Swaps in a new `T`, returning the previous one.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] or [`EcsError::MissingComponent`].
    pub fn replace<T: Component>(&mut self, entity: EntityId, value: T) -> EcsResult<T> {
        let slot = self.get_mut::<T>(entity)?;
        Ok(std::mem::replace(slot, value))
    }

    /// Detaches and returns a component.
    ///
    /// The destruction signal fires while the component is still attached.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive,
    /// [`EcsError::MissingComponent`] if it has no `T`.
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> EcsResult<T> {
        self.check(entity)?;
        let id = self
            .components
            .get::<T>()
            .filter(|id| self.pools[id.index()].contains(entity))
            .ok_or_else(|| Self::missing::<T>(entity))?;

        self.notify_destroy(id, entity);
        downcast_mut::<T>(&mut self.pools[id.index()]).remove(entity)
    }

    /// Checks whether `entity` has every component in `Q`.
    #[must_use]
    pub fn has<Q: ComponentSet>(&self, entity: EntityId) -> bool {
        Q::lookup(&self.components).into_iter().all(|id| {
            id.is_some_and(|id| self.pools[id.index()].contains(entity))
        })
    }

    /// Checks whether `entity` has at least one component in `Q`.
    #[must_use]
    pub fn has_any<Q: ComponentSet>(&self, entity: EntityId) -> bool {
        Q::lookup(&self.components).into_iter().any(|id| {
            id.is_some_and(|id| self.pools[id.index()].contains(entity))
        })
    }

    /// Gets a component.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] or [`EcsError::MissingComponent`].
    pub fn get<T: Component>(&self, entity: EntityId) -> EcsResult<&T> {
        self.check(entity)?;
        self.try_get::<T>(entity)
            .ok_or_else(|| Self::missing::<T>(entity))
    }

    /// Gets a component mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] or [`EcsError::MissingComponent`].
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> EcsResult<&mut T> {
        self.check(entity)?;
        let id = self
            .components
            .get::<T>()
            .ok_or_else(|| Self::missing::<T>(entity))?;
        downcast_mut::<T>(&mut self.pools[id.index()])
            .get_mut(entity)
            .ok_or_else(|| Self::missing::<T>(entity))
    }

    /// Gets a component if present.
    #[must_use]
    pub fn try_get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// Gets several components of one entity at once, in `Q` order.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] or [`EcsError::MissingComponent`] naming
    /// the first absent type.
    ///
    /// # Panics
    ///
    /// Panics if `Q` names a type twice.
    pub fn get_many<Q: ComponentSet>(&mut self, entity: EntityId) -> EcsResult<Q::RefsMut<'_>> {
        self.check(entity)?;
        let ids = Q::assure(self);
        for (id, name) in ids.iter().zip(Q::names()) {
            if !self.pools[id.index()].contains(entity) {
                return Err(EcsError::MissingComponent {
                    entity,
                    component: name,
                });
            }
        }

        let Some((pools, _)) = split_pools(&mut self.pools, &ids, &[]) else {
            panic!("get_many cannot name a component twice");
        };
        Q::fetch_mut(pools.into_iter(), entity).ok_or(EcsError::InvalidEntity(entity))
    }

    /// Read-only access to the pool of `T`, if the type was ever used.
    #[must_use]
    pub fn storage<T: Component>(&self) -> Option<&Storage<T>> {
        let id = self.components.get::<T>()?;
        Some(downcast_ref::<T>(self.pools[id.index()].as_ref()))
    }

    /// Listeners called after a `T` is attached.
    pub fn on_construct<T: Component>(&mut self) -> Sink<'_> {
        let id = self.assure::<T>();
        self.pools[id.index()]
            .signal_mut(SignalKind::Construct)
            .sink()
    }

    /// Listeners called before a `T` is detached.
    pub fn on_destroy<T: Component>(&mut self) -> Sink<'_> {
        let id = self.assure::<T>();
        self.pools[id.index()].signal_mut(SignalKind::Destroy).sink()
    }

    // =========================================================================
    // Signal dispatch
    // =========================================================================

    /// Runs after `id` was attached to `entity`.
    fn notify_construct(&mut self, id: ComponentId, entity: EntityId) {
        let subscribers = self.pools[id.index()]
            .signal_mut(SignalKind::Construct)
            .take_groups();

        for group in subscribers.iter().rev() {
            let data = &mut self.groups[group.index()];
            if data.signature.excludes(id) {
                data.discard(&mut self.pools, entity);
            }
        }
        for group in &subscribers {
            let data = &mut self.groups[group.index()];
            if data.signature.requires(id) {
                data.admit(&mut self.pools, entity, None);
            }
        }

        let signal = self.pools[id.index()].signal_mut(SignalKind::Construct);
        signal.restore_groups(subscribers);
        signal.publish(entity);
    }

    /// Runs before `id` is detached from `entity`.
    fn notify_destroy(&mut self, id: ComponentId, entity: EntityId) {
        let subscribers = self.pools[id.index()]
            .signal_mut(SignalKind::Destroy)
            .take_groups();

        for group in subscribers.iter().rev() {
            let data = &mut self.groups[group.index()];
            if data.signature.requires(id) {
                data.discard(&mut self.pools, entity);
            }
        }
        for group in &subscribers {
            let data = &mut self.groups[group.index()];
            if data.signature.excludes(id) {
                data.admit(&mut self.pools, entity, Some(id));
            }
        }

        let signal = self.pools[id.index()].signal_mut(SignalKind::Destroy);
        signal.restore_groups(subscribers);
        signal.publish(entity);
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Uncached query over every entity that has all of `Q`.
    ///
    /// # Panics
    ///
    /// Panics if `Q` is empty or names a type twice.
    pub fn view<Q: ComponentSet>(&mut self) -> View<'_, Q> {
        self.view_excluding::<Q, ()>()
    }

    /// Uncached query over entities that have all of `Q` and none of `X`.
    ///
    /// # Panics
    ///
    /// Panics if `Q` is empty, names a type twice, or shares a type with `X`.
    pub fn view_excluding<Q: ComponentSet, X: ComponentSet>(&mut self) -> View<'_, Q> {
        let required = Q::assure(self);
        let excluded = X::assure(self);
        View::new(&mut self.pools, &required, &excluded)
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Returns the group that owns `O`, observes `G` and excludes `X`,
    /// building it on first request.
    ///
    /// Requests with the same sets in any order return the same handle.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidGroup`] for malformed sets,
    /// [`EcsError::ConflictingGroup`] if `O` overlaps the owned set of a
    /// group that is neither nested in this one nor contains it.
    pub fn group<O, G, X>(&mut self) -> EcsResult<GroupHandle>
    where
        O: ComponentSet,
        G: ComponentSet,
        X: ComponentSet,
    {
        let owned = O::assure(self);
        let get = G::assure(self);
        let exclude = X::assure(self);
        let signature = GroupSignature::new(owned, get, exclude)?;

        if let Some(existing) = self.groups.iter().position(|g| g.signature == signature) {
            return Ok(GroupHandle(GroupId::new(existing)));
        }

        let rank = self.directory_rank(&signature)?;
        let id = GroupId::new(self.groups.len());
        let mut data = GroupData::new(signature, self.config.page_size);
        data.populate(&mut self.pools);

        for component in data.signature.observed() {
            let pool = &mut self.pools[component.index()];
            pool.signal_mut(SignalKind::Construct).bind_group(id);
            pool.signal_mut(SignalKind::Destroy).bind_group(id);
        }

        tracing::debug!(
            "Built {} group #{} with {} members",
            if data.signature.is_owning() { "owning" } else { "non-owning" },
            id.index(),
            data.len()
        );
        self.groups.push(data);
        self.directory.insert(rank, id);

        let mut ranks = vec![0; self.groups.len()];
        for (position, group) in self.directory.iter().enumerate() {
            ranks[group.index()] = position;
        }
        for pool in &mut self.pools {
            pool.signal_mut(SignalKind::Construct).sort_groups(&ranks);
            pool.signal_mut(SignalKind::Destroy).sort_groups(&ranks);
        }

        Ok(GroupHandle(id))
    }

    /// Finds where a new group goes in the directory.
    fn directory_rank(&self, signature: &GroupSignature) -> EcsResult<usize> {
        if !signature.is_owning() {
            return Ok(self.directory.len());
        }

        let mut after = 0;
        let mut before = self.directory.len();
        for (rank, group) in self.directory.iter().enumerate() {
            let other = &self.groups[group.index()].signature;
            let Some(shared) = signature.shared_owned(other) else {
                continue;
            };

            if signature.is_nested_in(other) {
                after = after.max(rank + 1);
            } else if other.is_nested_in(signature) {
                before = before.min(rank);
            } else {
                let component = self.components.name(shared);
                tracing::warn!("Rejected owning group: {} is already owned", component);
                return Err(EcsError::ConflictingGroup { component });
            }
        }

        if after > before {
            let component = self.components.name(signature.owned()[0]);
            tracing::warn!("Rejected owning group: no consistent nesting over {}", component);
            return Err(EcsError::ConflictingGroup { component });
        }
        Ok(before)
    }

    fn group_data(&self, handle: GroupHandle) -> &GroupData {
        self.groups
            .get(handle.0.index())
            .expect("Group handle out of range")
    }

    /// Number of members of a group.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is out of range for this registry.
    #[must_use]
    pub fn group_len(&self, handle: GroupHandle) -> usize {
        self.group_data(handle).len()
    }

    /// Members of a group, contiguous and in iteration order.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is out of range for this registry.
    #[must_use]
    pub fn group_entities(&self, handle: GroupHandle) -> &[EntityId] {
        self.group_data(handle).entities(&self.pools)
    }

    /// Checks whether `entity` is a member of a group.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is out of range for this registry.
    #[must_use]
    pub fn group_contains(&self, handle: GroupHandle, entity: EntityId) -> bool {
        self.group_data(handle).contains(&self.pools, entity)
    }

    /// The component sets a group was built from.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is out of range for this registry.
    #[must_use]
    pub fn group_signature(&self, handle: GroupHandle) -> &GroupSignature {
        &self.group_data(handle).signature
    }

    /// Number of groups built so far.
    #[inline]
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Iteration access to a group's members and the components in `Q`.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotObserved`] if the group neither owns nor observes a
    /// type in `Q`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is out of range for this registry or `Q` names a
    /// type twice.
    pub fn group_view<Q: ComponentSet>(&mut self, handle: GroupHandle) -> EcsResult<GroupView<'_, Q>> {
        let data = self
            .groups
            .get(handle.0.index())
            .expect("Group handle out of range");

        let mut ids = Vec::with_capacity(Q::LEN);
        for (id, name) in Q::lookup(&self.components).into_iter().zip(Q::names()) {
            match id {
                Some(id) if data.signature.requires(id) => ids.push(id),
                _ => return Err(EcsError::NotObserved { component: name }),
            }
        }
        let direct: Vec<bool> = ids.iter().map(|&id| data.signature.owns(id)).collect();

        let (len, lead) = match &data.membership {
            Membership::Owning { len } => (*len, Some(data.signature.owned()[0])),
            Membership::Tracking { set } => (set.len(), None),
        };
        let queried_owned = direct.iter().position(|&owned| owned);
        let shared: Vec<ComponentId> = match (lead, queried_owned) {
            (Some(lead), None) => vec![lead],
            _ => Vec::new(),
        };

        let Some((pools, shared)) = split_pools(&mut self.pools, &ids, &shared) else {
            panic!("A group view cannot name a component twice");
        };
        let lead_set = shared.into_iter().next().map(|pool| pool.sparse_set());
        let driver = match (&data.membership, queried_owned, lead_set) {
            (Membership::Tracking { set }, _, _) => Driver::Tracked(set),
            (Membership::Owning { .. }, Some(slot), _) => Driver::Owned { slot },
            (Membership::Owning { .. }, None, Some(set)) => Driver::Lead(set),
            (Membership::Owning { .. }, None, None) => unreachable!("Lead pool was borrowed"),
        };

        Ok(GroupView::new(pools, direct, driver, len))
    }
}
