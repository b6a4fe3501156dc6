//! # Entity Management
//!
//! Entities are lightweight identifiers: a plain index into the registry's
//! slot table. The maximum representable value is reserved as the null
//! sentinel for every handle representation.

use std::fmt;

/// Unique identifier for an entity.
///
/// The value is the index of the entity's slot. When an entity is destroyed
/// its slot is recycled, so a reused value always names a new entity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u32::MAX);

    /// Creates an entity ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this ID.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// Returns the slot index of this ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("EntityId(null)")
        } else {
            write!(f, "EntityId({})", self.0)
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

impl From<Null> for EntityId {
    fn from(_: Null) -> Self {
        Self::NULL
    }
}

/// Handle representations that reserve their maximum value as null.
pub trait EntityLike: Copy + Eq {
    /// Returns the reserved null value of this representation.
    fn null() -> Self;

    /// Checks whether `self` is the reserved null value.
    #[inline]
    fn is_null_value(self) -> bool {
        self == Self::null()
    }
}

impl EntityLike for EntityId {
    #[inline]
    fn null() -> Self {
        Self::NULL
    }
}

/// The null sentinel.
///
/// Compares equal to the null value of any [`EntityLike`] handle, so callers
/// can write `entity == Null` without knowing the handle's width.
#[derive(Clone, Copy, Debug, Default)]
pub struct Null;

impl<E: EntityLike> PartialEq<E> for Null {
    #[inline]
    fn eq(&self, other: &E) -> bool {
        other.is_null_value()
    }
}

impl PartialEq<Null> for EntityId {
    #[inline]
    fn eq(&self, _: &Null) -> bool {
        self.is_null()
    }
}

macro_rules! impl_raw_entity_like {
    ($($raw:ty),+) => {
        $(
            impl EntityLike for $raw {
                #[inline]
                fn null() -> Self {
                    <$raw>::MAX
                }
            }

            impl PartialEq<Null> for $raw {
                #[inline]
                fn eq(&self, _: &Null) -> bool {
                    *self == <$raw>::MAX
                }
            }
        )+
    };
}

impl_raw_entity_like!(u16, u32, u64, usize);
