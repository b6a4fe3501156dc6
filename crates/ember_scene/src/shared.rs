//! # Shared Scene
//!
//! The registry is single-threaded. Hosts that touch a scene from more than
//! one thread (an editor UI next to a game loop, say) serialize every access
//! through this lock.
//!
//! The lock is not reentrant. Component listeners run while the scene is
//! held, so a listener that captures a `SharedScene` must use
//! [`SharedScene::try_lock`] or [`SharedScene::try_with`]; `lock` from a
//! listener deadlocks.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::scene::Scene;

/// Clonable, lock-protected handle to a [`Scene`].
#[derive(Clone, Debug, Default)]
pub struct SharedScene {
    inner: Arc<Mutex<Scene>>,
}

impl SharedScene {
    /// Wraps a scene.
    #[must_use]
    pub fn new(scene: Scene) -> Self {
        Self {
            inner: Arc::new(Mutex::new(scene)),
        }
    }

    /// Blocks until the scene is free and returns exclusive access.
    pub fn lock(&self) -> MutexGuard<'_, Scene> {
        self.inner.lock()
    }

    /// Returns exclusive access if the scene is free right now.
    ///
    /// `None` when another thread holds it, or when called from a listener
    /// firing under this scene's own lock.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Scene>> {
        self.inner.try_lock()
    }

    /// Runs `f` if the scene is free right now, see [`try_lock`](Self::try_lock).
    pub fn try_with<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> Option<R> {
        self.inner.try_lock().map(|mut scene| f(&mut scene))
    }

    /// Runs `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// Runs one frame of scripts under the lock.
    pub fn update(&self, dt: f32) {
        self.inner.lock().update(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{SpriteRenderer, Transform};
    use crate::script::{Script, ScriptContext, Scripts};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Counter;

    impl Script for Counter {
        fn on_update(&mut self, ctx: &mut ScriptContext<'_>, _dt: f32) {
            ctx.transform.translation[1] += 1.0;
        }
    }

    #[test]
    fn test_updates_from_many_threads() {
        let shared = SharedScene::default();
        let id = shared.with(|scene| {
            let mut entity = scene.create_entity("counter").unwrap();
            entity.add(Scripts::with(Counter)).unwrap();
            entity.id()
        });

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        shared.update(0.016);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let scene = shared.lock();
        let transform = scene.registry().get::<Transform>(id).unwrap();
        assert!((transform.translation[1] - 100.0).abs() < f32::EPSILON);
        assert_eq!(scene.frame(), 100);
    }

    #[test]
    fn test_listener_under_lock_sees_scene_busy() {
        let shared = SharedScene::default();
        let busy = Arc::new(AtomicUsize::new(0));

        let listener_scene = shared.clone();
        let listener_busy = Arc::clone(&busy);
        shared.with(|scene| {
            scene
                .registry_mut()
                .on_construct::<SpriteRenderer>()
                .connect(move |_| {
                    if listener_scene.try_with(|_| ()).is_none() {
                        listener_busy.fetch_add(1, Ordering::SeqCst);
                    }
                });
            scene
                .create_entity("sprite")
                .unwrap()
                .add(SpriteRenderer::default())
                .unwrap();
        });

        assert_eq!(busy.load(Ordering::SeqCst), 1);
        assert!(shared.try_lock().is_some());
    }
}
