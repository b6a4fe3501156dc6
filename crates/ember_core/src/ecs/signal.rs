//! # Component Signals
//!
//! Creation and destruction notification points of a component pool.
//!
//! A [`Signal`] holds two kinds of subscribers:
//! - cached groups, maintained by the registry in directory order
//! - user listeners, invoked in registration order
//!
//! Only the registry publishes. Listeners receive the entity ID alone while
//! the registry is exclusively borrowed, so a listener cannot borrow it
//! again. A listener that reaches the registry through a lock its caller
//! already holds deadlocks instead; such listeners must use a `try_lock`.

use std::fmt;

use super::entity::EntityId;
use super::group::GroupId;

/// Callback invoked with the entity whose component changed.
pub type Listener = Box<dyn FnMut(EntityId) + Send>;

/// Which notification point of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Fired right after a component was added.
    Construct,
    /// Fired right before a component is removed.
    Destroy,
}

/// Identifies a connected listener within its signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Subscriber list of one notification point.
#[derive(Default)]
pub struct Signal {
    listeners: Vec<(ListenerId, Listener)>,
    groups: Vec<GroupId>,
    next_id: u64,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners.len())
            .field("groups", &self.groups)
            .finish()
    }
}

impl Signal {
    /// Returns the number of user listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns the number of subscribed groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Returns a subscription-only handle to this signal.
    pub fn sink(&mut self) -> Sink<'_> {
        Sink { signal: self }
    }

    /// Invokes every user listener in registration order.
    pub(crate) fn publish(&mut self, entity: EntityId) {
        for (_, listener) in &mut self.listeners {
            listener(entity);
        }
    }

    pub(crate) fn bind_group(&mut self, group: GroupId) {
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
    }

    /// Detaches the group subscriber list for dispatch.
    pub(crate) fn take_groups(&mut self) -> Vec<GroupId> {
        std::mem::take(&mut self.groups)
    }

    pub(crate) fn restore_groups(&mut self, groups: Vec<GroupId>) {
        self.groups = groups;
    }

    /// Re-sorts group subscribers by their directory rank.
    pub(crate) fn sort_groups(&mut self, rank: &[usize]) {
        self.groups.sort_by_key(|group| rank[group.index()]);
    }
}

/// Subscription-only view of a [`Signal`].
pub struct Sink<'a> {
    signal: &'a mut Signal,
}

impl Sink<'_> {
    /// Connects a listener, returning its ID.
    pub fn connect(&mut self, listener: impl FnMut(EntityId) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.signal.next_id);
        self.signal.next_id += 1;
        self.signal.listeners.push((id, Box::new(listener)));
        id
    }

    /// Disconnects a listener. Returns `false` if it was not connected.
    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        let before = self.signal.listeners.len();
        self.signal.listeners.retain(|(listener, _)| *listener != id);
        before != self.signal.listeners.len()
    }

    /// Returns the number of connected listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signal.listeners.len()
    }

    /// Returns `true` if no listener is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signal.listeners.is_empty()
    }
}
