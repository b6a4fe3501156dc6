//! # Scripts
//!
//! Native behaviour attached to entities.
//!
//! A [`Scripts`] component holds any number of [`Script`] objects. Once per
//! frame the scene walks every entity with `Scripts` and a `Transform`:
//!
//! 1. `on_create` for scripts seen for the first time
//! 2. `on_start` for the same scripts, after all of them were created
//! 3. `on_update` for every script
//!
//! `on_destroy` runs when the entity is destroyed through the scene.
//!
//! Scripts never touch the registry directly; structural changes are queued
//! on [`Commands`] and applied after the frame's iteration finishes.

use std::fmt;

use ember_core::{Component, EntityId};

use crate::components::Transform;

/// Deferred structural change requested by a script.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Creates a named entity with the given transform.
    Spawn {
        /// Tag of the new entity.
        name: String,
        /// Initial transform.
        transform: Transform,
    },
    /// Destroys an entity, running its `on_destroy` hooks.
    Despawn(EntityId),
}

/// Ordered queue of [`Command`]s, applied in recording order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the creation of an entity.
    pub fn spawn(&mut self, name: impl Into<String>, transform: Transform) {
        self.queue.push(Command::Spawn {
            name: name.into(),
            transform,
        });
    }

    /// Queues the destruction of an entity.
    pub fn despawn(&mut self, entity: EntityId) {
        self.queue.push(Command::Despawn(entity));
    }

    /// Number of queued commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Checks whether nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes and returns every queued command, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.queue.drain(..)
    }
}

/// What a script hook may touch.
pub struct ScriptContext<'a> {
    /// The entity the script is attached to.
    pub entity: EntityId,
    /// The entity's transform.
    pub transform: &'a mut Transform,
    /// Deferred changes, applied after the frame.
    pub commands: &'a mut Commands,
}

/// Behaviour attached to an entity. Every hook defaults to doing nothing.
pub trait Script: Send + Sync + 'static {
    /// First frame the script is seen.
    fn on_create(&mut self, _ctx: &mut ScriptContext<'_>) {}

    /// After every script of the entity ran `on_create`.
    fn on_start(&mut self, _ctx: &mut ScriptContext<'_>) {}

    /// Every frame, `dt` in seconds.
    fn on_update(&mut self, _ctx: &mut ScriptContext<'_>, _dt: f32) {}

    /// Before the entity is destroyed. Only runs if `on_create` ran.
    fn on_destroy(&mut self, _ctx: &mut ScriptContext<'_>) {}
}

struct ScriptEntry {
    script: Box<dyn Script>,
    created: bool,
    started: bool,
}

/// Component holding an entity's scripts, run in insertion order.
#[derive(Default)]
pub struct Scripts {
    entries: Vec<ScriptEntry>,
}

impl Component for Scripts {}

impl fmt::Debug for Scripts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scripts")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl Scripts {
    /// Creates an empty script list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list holding one script.
    #[must_use]
    pub fn with(script: impl Script) -> Self {
        let mut scripts = Self::new();
        scripts.push(script);
        scripts
    }

    /// Appends a script. Its `on_create` runs on the next frame.
    pub fn push(&mut self, script: impl Script) {
        self.entries.push(ScriptEntry {
            script: Box::new(script),
            created: false,
            started: false,
        });
    }

    /// Number of scripts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the list is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs one frame of hooks for the entity owning this list.
    pub fn run_frame(&mut self, ctx: &mut ScriptContext<'_>, dt: f32) {
        for entry in self.entries.iter_mut().filter(|entry| !entry.created) {
            entry.script.on_create(ctx);
            entry.created = true;
        }
        for entry in self.entries.iter_mut().filter(|entry| !entry.started) {
            entry.script.on_start(ctx);
            entry.started = true;
        }
        for entry in &mut self.entries {
            entry.script.on_update(ctx, dt);
        }
    }

    /// Runs `on_destroy` for every created script.
    pub fn run_destroy(&mut self, ctx: &mut ScriptContext<'_>) {
        for entry in self.entries.iter_mut().filter(|entry| entry.created) {
            entry.script.on_destroy(ctx);
            entry.created = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn record(&self, hook: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.label, hook));
        }
    }

    impl Script for Recorder {
        fn on_create(&mut self, _ctx: &mut ScriptContext<'_>) {
            self.record("create");
        }

        fn on_start(&mut self, _ctx: &mut ScriptContext<'_>) {
            self.record("start");
        }

        fn on_update(&mut self, ctx: &mut ScriptContext<'_>, dt: f32) {
            ctx.transform.translation[0] += dt;
            self.record("update");
        }

        fn on_destroy(&mut self, ctx: &mut ScriptContext<'_>) {
            ctx.commands.spawn("debris", *ctx.transform);
            self.record("destroy");
        }
    }

    fn recorder(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Recorder {
        Recorder {
            label,
            log: Arc::clone(log),
        }
    }

    #[test]
    fn test_hook_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scripts = Scripts::with(recorder("a", &log));
        scripts.push(recorder("b", &log));

        let mut transform = Transform::default();
        let mut commands = Commands::new();
        let mut ctx = ScriptContext {
            entity: EntityId::from_raw(0),
            transform: &mut transform,
            commands: &mut commands,
        };

        scripts.run_frame(&mut ctx, 0.5);
        scripts.run_frame(&mut ctx, 0.5);
        scripts.run_destroy(&mut ctx);
        scripts.run_destroy(&mut ctx);

        assert_eq!(
            *log.lock().unwrap(),
            [
                "a:create", "b:create", "a:start", "b:start", "a:update", "b:update",
                "a:update", "b:update", "a:destroy", "b:destroy",
            ]
        );
        assert_eq!(commands.len(), 2);
        assert!((transform.translation[0] - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_uncreated_scripts_skip_destroy() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scripts = Scripts::with(recorder("a", &log));

        let mut transform = Transform::default();
        let mut commands = Commands::new();
        let mut ctx = ScriptContext {
            entity: EntityId::from_raw(0),
            transform: &mut transform,
            commands: &mut commands,
        };
        scripts.run_destroy(&mut ctx);

        assert!(log.lock().unwrap().is_empty());
        assert!(commands.is_empty());
    }

    #[test]
    fn test_commands_drain_in_order() {
        let mut commands = Commands::new();
        commands.spawn("a", Transform::default());
        commands.despawn(EntityId::from_raw(3));

        let drained: Vec<Command> = commands.drain().collect();
        assert!(matches!(&drained[0], Command::Spawn { name, .. } if name == "a"));
        assert_eq!(drained[1], Command::Despawn(EntityId::from_raw(3)));
        assert!(commands.is_empty());
    }
}
