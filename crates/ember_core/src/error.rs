//! # ECS Error Types
//!
//! All errors that can occur in the entity component system.
//!
//! Every error reports a broken caller contract. After ignoring one, the
//! registry must be treated as unusable.

use thiserror::Error;

use crate::ecs::EntityId;

/// Errors that can occur in the ECS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The handle is null, was never created, or was already destroyed.
    #[error("invalid entity: {0}")]
    InvalidEntity(EntityId),

    /// The entity already owns a component of this type.
    #[error("entity {entity} already has component {component}")]
    DuplicateComponent {
        /// The entity that was targeted.
        entity: EntityId,
        /// Type name of the component.
        component: &'static str,
    },

    /// The entity does not own a component of this type.
    #[error("entity {entity} has no component {component}")]
    MissingComponent {
        /// The entity that was targeted.
        entity: EntityId,
        /// Type name of the component.
        component: &'static str,
    },

    /// Tried to add an entity that a sparse set already contains.
    #[error("entity {0} is already in the set")]
    AlreadyPresent(EntityId),

    /// Tried to remove or move an entity that a sparse set does not contain.
    #[error("entity {0} is not in the set")]
    NotPresent(EntityId),

    /// Two owning groups claim the same component without being nested.
    #[error("conflicting owning groups over component {component}")]
    ConflictingGroup {
        /// Type name of the contested component.
        component: &'static str,
    },

    /// The group request itself is malformed.
    #[error("invalid group: {0}")]
    InvalidGroup(String),

    /// A group query asked for a component the group neither owns nor observes.
    #[error("component {component} is not observed by the group")]
    NotObserved {
        /// Type name of the component.
        component: &'static str,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_entity() {
        let error = EcsError::MissingComponent {
            entity: EntityId::from_raw(3),
            component: "Position",
        };
        assert_eq!(error.to_string(), "entity #3 has no component Position");
        assert_eq!(
            EcsError::InvalidEntity(EntityId::NULL).to_string(),
            "invalid entity: null"
        );
    }
}
