//! # Entity Handle
//!
//! Borrowed view of one entity in a [`Scene`], for builder-style setup.

use ember_core::{Component, EntityId};

use crate::components::Tag;
use crate::error::SceneResult;
use crate::scene::Scene;

/// Mutable access to one alive entity of a scene.
///
/// # Example
///
/// ```rust,ignore
/// let mut player = scene.create_entity("player")?;
/// player.add(SpriteRenderer::colored([1.0, 0.0, 0.0, 1.0]))?;
/// player.get_mut::<Transform>()?.translation = [0.0, 1.0, 0.0];
/// let id = player.id();
/// ```
#[derive(Debug)]
pub struct EntityMut<'s> {
    scene: &'s mut Scene,
    entity: EntityId,
}

impl<'s> EntityMut<'s> {
    /// Callers guarantee `entity` is alive in `scene`.
    pub(crate) fn new(scene: &'s mut Scene, entity: EntityId) -> Self {
        Self { scene, entity }
    }

    /// The entity's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.entity
    }

    /// Attaches a component.
    ///
    /// # Errors
    ///
    /// Fails if the entity already has a `T`.
    pub fn add<T: Component>(&mut self, value: T) -> SceneResult<&mut T> {
        Ok(self.scene.registry_mut().emplace(self.entity, value)?)
    }

    /// Attaches a component, replacing any existing `T`.
    ///
    /// # Errors
    ///
    /// Fails if the entity was destroyed behind the handle's back.
    pub fn insert<T: Component>(&mut self, value: T) -> SceneResult<&mut T> {
        Ok(self
            .scene
            .registry_mut()
            .emplace_or_replace(self.entity, value)?)
    }

    /// Gets a component.
    ///
    /// # Errors
    ///
    /// Fails if the entity has no `T`.
    pub fn get<T: Component>(&self) -> SceneResult<&T> {
        Ok(self.scene.registry().get(self.entity)?)
    }

    /// Gets a component mutably.
    ///
    /// # Errors
    ///
    /// Fails if the entity has no `T`.
    pub fn get_mut<T: Component>(&mut self) -> SceneResult<&mut T> {
        Ok(self.scene.registry_mut().get_mut(self.entity)?)
    }

    /// Checks whether the entity has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self) -> bool {
        self.scene.registry().has::<(T,)>(self.entity)
    }

    /// Detaches and returns a component.
    ///
    /// # Errors
    ///
    /// Fails if the entity has no `T`.
    pub fn remove<T: Component>(&mut self) -> SceneResult<T> {
        Ok(self.scene.registry_mut().remove(self.entity)?)
    }

    /// The entity's tag, if it still has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.scene
            .registry()
            .try_get::<Tag>(self.entity)
            .map(|tag| tag.name.as_str())
    }

    /// Destroys the entity, running its scripts' `on_destroy` hooks.
    ///
    /// # Errors
    ///
    /// Fails if the entity was already destroyed.
    pub fn destroy(self) -> SceneResult<()> {
        self.scene.destroy_entity(self.entity)
    }
}

#[cfg(test)]
mod tests {
    use crate::components::{SpriteRenderer, Transform};
    use crate::error::SceneError;
    use crate::Scene;
    use ember_core::EcsError;

    #[test]
    fn test_builder_flow() {
        let mut scene = Scene::new();
        let mut entity = scene.create_entity("crate").unwrap();

        assert_eq!(entity.name(), Some("crate"));
        assert!(entity.has::<Transform>());
        assert!(!entity.has::<SpriteRenderer>());

        entity.add(SpriteRenderer::default()).unwrap();
        let error = entity.add(SpriteRenderer::default()).unwrap_err();
        assert!(matches!(
            error,
            SceneError::Ecs(EcsError::DuplicateComponent { .. })
        ));

        entity.insert(SpriteRenderer::colored([0.5; 4])).unwrap();
        assert_eq!(entity.get::<SpriteRenderer>().unwrap().color, [0.5; 4]);

        entity.get_mut::<Transform>().unwrap().rotation = 1.0;
        let removed = entity.remove::<Transform>().unwrap();
        assert!((removed.rotation - 1.0).abs() < f32::EPSILON);
        assert!(entity.get::<Transform>().is_err());

        let id = entity.id();
        entity.destroy().unwrap();
        assert!(!scene.registry().is_valid(id));
    }
}
