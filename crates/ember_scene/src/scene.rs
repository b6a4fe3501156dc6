//! # Scene
//!
//! A registry plus the default components, scripts and the per-frame
//! render pass.
//!
//! ## Frame
//!
//! ```text
//! update(dt)      scripts run through a (Scripts, Transform) view,
//!                 queued commands are applied afterwards
//! render(sink)    primary camera in Camera storage order,
//!                 sprites from the (Transform, SpriteRenderer) group
//! ```

use ember_core::{EcsError, EntityId, GroupHandle, Registry};

use crate::components::{multiply, Camera, SpriteRenderer, Tag, Transform};
use crate::config::SceneConfig;
use crate::error::SceneResult;
use crate::handle::EntityMut;
use crate::render::{CameraUniform, RenderSink, SpriteInstance};
use crate::script::{Command, Commands, ScriptContext, Scripts};

/// Entities, their components and the frame logic driving them.
///
/// # Example
///
/// ```rust,ignore
/// let mut scene = Scene::new();
///
/// scene.create_entity("camera")?.add(Camera::orthographic(10.0))?;
/// scene
///     .create_entity("player")?
///     .add(SpriteRenderer::colored([1.0, 0.0, 0.0, 1.0]))?;
///
/// scene.update(1.0 / 60.0);
/// scene.render(&mut renderer)?;
/// ```
#[derive(Debug)]
pub struct Scene {
    registry: Registry,
    config: SceneConfig,
    sprites: GroupHandle,
    viewport: [u32; 2],
    frame: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Creates an empty scene with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default()).expect("Default scene configuration is valid")
    }

    /// Creates an empty scene.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn with_config(config: SceneConfig) -> SceneResult<Self> {
        config.validate()?;
        let mut registry = Registry::with_config(config.registry)?;
        let sprites = if config.owning_sprite_group {
            registry.group::<(Transform, SpriteRenderer), (), ()>()?
        } else {
            registry.group::<(), (Transform, SpriteRenderer), ()>()?
        };

        tracing::debug!(
            "Created scene with {} sprite group, viewport {}x{}",
            if config.owning_sprite_group { "owning" } else { "non-owning" },
            config.viewport[0],
            config.viewport[1]
        );
        Ok(Self {
            registry,
            viewport: config.viewport,
            config,
            sprites,
            frame: 0,
        })
    }

    /// The configuration the scene was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The underlying registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The underlying registry, for queries the scene does not wrap.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The group feeding the render pass.
    #[inline]
    #[must_use]
    pub fn sprite_group(&self) -> GroupHandle {
        self.sprites
    }

    /// Frames completed by [`update`](Self::update).
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Current viewport size in pixels.
    #[inline]
    #[must_use]
    pub fn viewport(&self) -> [u32; 2] {
        self.viewport
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with a [`Tag`] and a default [`Transform`].
    ///
    /// An empty `name` falls back to the configured default name.
    ///
    /// # Errors
    ///
    /// Propagates registry failures.
    pub fn create_entity(&mut self, name: &str) -> SceneResult<EntityMut<'_>> {
        let name = if name.is_empty() {
            self.config.default_entity_name.clone()
        } else {
            name.to_string()
        };

        let entity = self.registry.create();
        self.registry.emplace(entity, Tag::new(name))?;
        self.registry.emplace(entity, Transform::default())?;
        Ok(EntityMut::new(self, entity))
    }

    /// Handle to an existing entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive.
    pub fn entity(&mut self, entity: EntityId) -> SceneResult<EntityMut<'_>> {
        if !self.registry.is_valid(entity) {
            return Err(EcsError::InvalidEntity(entity).into());
        }
        Ok(EntityMut::new(self, entity))
    }

    /// Destroys an entity.
    ///
    /// Scripts get `on_destroy` first if the entity has both [`Scripts`]
    /// and a [`Transform`]. Commands they queue are applied after the
    /// entity is gone.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> SceneResult<()> {
        if !self.registry.is_valid(entity) {
            return Err(EcsError::InvalidEntity(entity).into());
        }

        let mut commands = Commands::new();
        if self.registry.has::<(Scripts, Transform)>(entity) {
            let (scripts, transform) = self.registry.get_many::<(Scripts, Transform)>(entity)?;
            scripts.run_destroy(&mut ScriptContext {
                entity,
                transform,
                commands: &mut commands,
            });
        }

        self.registry.destroy(entity)?;
        self.apply(commands);
        Ok(())
    }

    /// First entity tagged `name`, in tag storage order.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.registry
            .storage::<Tag>()?
            .iter()
            .find(|(_, tag)| tag.name == name)
            .map(|(entity, _)| entity)
    }

    // =========================================================================
    // Frame
    // =========================================================================

    /// Runs one frame of scripts, then applies the commands they queued.
    pub fn update(&mut self, dt: f32) {
        let mut commands = Commands::new();
        self.registry
            .view::<(Scripts, Transform)>()
            .each(|entity, scripts, transform| {
                let mut ctx = ScriptContext {
                    entity,
                    transform,
                    commands: &mut commands,
                };
                scripts.run_frame(&mut ctx, dt);
            });

        let queued = commands.len();
        self.apply(commands);
        self.frame += 1;
        tracing::debug!("Scene frame {} applied {} commands", self.frame, queued);
    }

    fn apply(&mut self, mut commands: Commands) {
        for command in commands.drain() {
            match command {
                Command::Spawn { name, transform } => {
                    let spawned = self
                        .create_entity(&name)
                        .and_then(|mut entity| entity.insert(transform).map(|_| ()));
                    if let Err(error) = spawned {
                        tracing::warn!("Dropped spawn of {}: {}", name, error);
                    }
                }
                Command::Despawn(entity) => {
                    if let Err(error) = self.destroy_entity(entity) {
                        tracing::warn!("Dropped despawn of {}: {}", entity, error);
                    }
                }
            }
        }
    }

    /// The first camera marked primary that also has a transform.
    #[must_use]
    pub fn primary_camera(&self) -> Option<EntityId> {
        self.registry
            .storage::<Camera>()?
            .iter()
            .find(|(entity, camera)| camera.primary && self.registry.has::<(Transform,)>(*entity))
            .map(|(entity, _)| entity)
    }

    /// Draws every sprite through the [`primary_camera`](Self::primary_camera).
    ///
    /// Returns `false` without touching `sink` when there is no primary
    /// camera.
    ///
    /// # Errors
    ///
    /// Propagates registry failures.
    pub fn render(&mut self, sink: &mut impl RenderSink) -> SceneResult<bool> {
        let camera = self.primary_camera().and_then(|entity| {
            let camera = self.registry.try_get::<Camera>(entity)?;
            let transform = self.registry.try_get::<Transform>(entity)?;
            Some(CameraUniform {
                view_projection: multiply(&camera.projection(), &transform.inverse_matrix()),
            })
        });
        let Some(camera) = camera else {
            return Ok(false);
        };

        sink.begin_scene(&camera);
        let mut drawn = 0usize;
        self.registry
            .group_view::<(Transform, SpriteRenderer)>(self.sprites)?
            .each(|entity, transform, sprite| {
                sink.draw_sprite(&SpriteInstance::new(entity, transform, sprite));
                drawn += 1;
            });
        sink.end_scene();

        tracing::debug!("Rendered {} sprites", drawn);
        Ok(true)
    }

    /// Adapts every camera without a fixed aspect ratio to a new viewport.
    pub fn on_viewport_resize(&mut self, width: u32, height: u32) {
        self.viewport = [width, height];
        self.registry.view::<(Camera,)>().each(|_, camera| {
            if !camera.fixed_aspect {
                camera.set_viewport(width, height);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FrameRecorder;
    use crate::script::Script;

    struct Mover {
        speed: f32,
    }

    impl Script for Mover {
        fn on_update(&mut self, ctx: &mut ScriptContext<'_>, dt: f32) {
            ctx.transform.translation[0] += self.speed * dt;
        }
    }

    #[test]
    fn test_create_entity_defaults() {
        let mut scene = Scene::new();
        let named = scene.create_entity("player").unwrap().id();
        let unnamed = scene.create_entity("").unwrap().id();

        assert_eq!(scene.find_by_name("player"), Some(named));
        assert_eq!(scene.find_by_name("Entity"), Some(unnamed));
        assert_eq!(scene.find_by_name("nobody"), None);
        assert_eq!(scene.registry().get::<Transform>(named).unwrap(), &Transform::default());
    }

    #[test]
    fn test_update_runs_scripts() {
        let mut scene = Scene::new();
        let mut entity = scene.create_entity("mover").unwrap();
        entity.add(Scripts::with(Mover { speed: 2.0 })).unwrap();
        let id = entity.id();

        scene.update(0.5);
        scene.update(0.5);

        let transform = scene.registry().get::<Transform>(id).unwrap();
        assert!((transform.translation[0] - 2.0).abs() < f32::EPSILON);
        assert_eq!(scene.frame(), 2);
    }

    #[test]
    fn test_render_without_camera() {
        let mut scene = Scene::new();
        scene
            .create_entity("sprite")
            .unwrap()
            .add(SpriteRenderer::default())
            .unwrap();

        let mut recorder = FrameRecorder::new();
        assert!(!scene.render(&mut recorder).unwrap());
        assert!(recorder.frames().is_empty());
    }

    #[test]
    fn test_render_draws_group_members() {
        let mut scene = Scene::new();
        scene
            .create_entity("camera")
            .unwrap()
            .add(Camera::orthographic(10.0))
            .unwrap();
        let sprite = scene.create_entity("sprite").unwrap().id();
        scene
            .entity(sprite)
            .unwrap()
            .add(SpriteRenderer::colored([0.0, 1.0, 0.0, 1.0]))
            .unwrap();
        scene.create_entity("empty").unwrap();

        let mut recorder = FrameRecorder::new();
        assert!(scene.render(&mut recorder).unwrap());

        let frame = recorder.last_frame().unwrap();
        assert!(frame.camera.is_some());
        assert_eq!(frame.sprites.len(), 1);
        assert_eq!(frame.sprites[0].entity, sprite.to_raw());
        assert_eq!(frame.sprites[0].color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_viewport_resize_skips_fixed_cameras() {
        let mut scene = Scene::new();
        let free = scene.create_entity("free").unwrap().id();
        scene.entity(free).unwrap().add(Camera::orthographic(5.0)).unwrap();

        let fixed = scene.create_entity("fixed").unwrap().id();
        let mut camera = Camera::orthographic(5.0);
        camera.fixed_aspect = true;
        camera.aspect = 1.0;
        scene.entity(fixed).unwrap().add(camera).unwrap();

        scene.on_viewport_resize(400, 100);

        assert_eq!(scene.viewport(), [400, 100]);
        assert!((scene.registry().get::<Camera>(free).unwrap().aspect - 4.0).abs() < f32::EPSILON);
        assert!((scene.registry().get::<Camera>(fixed).unwrap().aspect - 1.0).abs() < f32::EPSILON);
        assert_eq!(scene.primary_camera(), Some(free));
    }

    #[test]
    fn test_render_uses_primary_camera() {
        let mut scene = Scene::new();
        let late = scene.create_entity("late").unwrap().id();
        let early = scene.create_entity("early").unwrap().id();
        scene.entity(early).unwrap().add(Camera::orthographic(2.0)).unwrap();
        scene.entity(late).unwrap().add(Camera::orthographic(8.0)).unwrap();

        // Cameras without a transform make the Camera pool the larger one.
        for _ in 0..4 {
            let bare = scene.registry_mut().create();
            scene
                .registry_mut()
                .emplace(bare, Camera::orthographic(1.0))
                .unwrap();
        }
        scene.on_viewport_resize(100, 100);
        assert_eq!(scene.primary_camera(), Some(early));

        let mut recorder = FrameRecorder::new();
        assert!(scene.render(&mut recorder).unwrap());

        let view_projection = recorder.last_frame().unwrap().camera.unwrap().view_projection;
        assert!((view_projection[1][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_destroy_invalid_entity() {
        let mut scene = Scene::new();
        let id = scene.create_entity("gone").unwrap().id();
        scene.destroy_entity(id).unwrap();

        assert!(scene.destroy_entity(id).is_err());
        assert!(scene.entity(id).is_err());
    }
}
