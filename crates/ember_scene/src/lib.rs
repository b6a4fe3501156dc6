//! # EMBER Scene
//!
//! Game-facing layer over [`ember_core`]:
//! - [`Scene`] with default components (tag, transform, camera, sprite)
//! - Native [`Script`]s with deferred [`Commands`]
//! - A renderer boundary ([`RenderSink`]) fed with `Pod` instance data
//!
//! ## Architecture Rules
//!
//! 1. **No GPU here** - backends implement [`RenderSink`]
//! 2. **No structural changes mid-iteration** - scripts queue commands
//! 3. **One thread at a time** - use [`SharedScene`] to share a scene

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod components;
pub mod config;
pub mod error;
pub mod handle;
pub mod render;
pub mod scene;
pub mod script;
pub mod shared;

pub use components::{Camera, SpriteRenderer, Tag, Transform};
pub use config::SceneConfig;
pub use error::{SceneError, SceneResult};
pub use handle::EntityMut;
pub use render::{CameraUniform, FrameRecorder, RecordedFrame, RenderSink, SpriteInstance};
pub use scene::Scene;
pub use script::{Command, Commands, Script, ScriptContext, Scripts};
pub use shared::SharedScene;
