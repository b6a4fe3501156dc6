//! # Renderer Boundary
//!
//! The scene does not talk to a GPU. Each frame it hands a camera and a
//! stream of sprite instances to a [`RenderSink`]; the sink owns batching
//! and submission.
//!
//! Instance and uniform data are `Pod` so a GPU backend can upload them
//! with `bytemuck::cast_slice` and no per-field conversion.

use bytemuck::{Pod, Zeroable};
use ember_core::EntityId;

use crate::components::{Mat4, SpriteRenderer, Transform};

/// Per-sprite instance data.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SpriteInstance {
    /// Model matrix, column-major.
    pub model: Mat4,
    /// RGBA tint.
    pub color: [f32; 4],
    /// Texture repeat factor.
    pub tiling: f32,
    /// Texture slot, 0 for none.
    pub texture: u32,
    /// Raw id of the source entity, for picking.
    pub entity: u32,
    /// Padding to a 16-byte multiple.
    pub _padding: u32,
}

impl SpriteInstance {
    /// Builds the instance for one entity.
    #[must_use]
    pub fn new(entity: EntityId, transform: &Transform, sprite: &SpriteRenderer) -> Self {
        Self {
            model: transform.matrix(),
            color: sprite.color,
            tiling: sprite.tiling,
            texture: sprite.texture,
            entity: entity.to_raw(),
            _padding: 0,
        }
    }
}

/// Camera uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct CameraUniform {
    /// Projection * view, column-major.
    pub view_projection: Mat4,
}

/// Receives one frame of draw data.
///
/// Calls always come as `begin_scene`, any number of `draw_sprite`, then
/// `end_scene`.
pub trait RenderSink {
    /// Starts a frame seen through `camera`.
    fn begin_scene(&mut self, camera: &CameraUniform);

    /// Queues one sprite.
    fn draw_sprite(&mut self, instance: &SpriteInstance);

    /// Finishes the frame.
    fn end_scene(&mut self);
}

/// A frame captured by [`FrameRecorder`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedFrame {
    /// Camera the frame was drawn with.
    pub camera: Option<CameraUniform>,
    /// Sprites in submission order.
    pub sprites: Vec<SpriteInstance>,
}

impl RecordedFrame {
    /// Instance data as raw bytes, ready for a vertex buffer upload.
    #[must_use]
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.sprites)
    }
}

/// Headless sink that keeps every finished frame.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    frames: Vec<RecordedFrame>,
    current: Option<RecordedFrame>,
}

impl FrameRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished frames, oldest first.
    #[inline]
    #[must_use]
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// The most recent finished frame.
    #[inline]
    #[must_use]
    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// Drops every recorded frame.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.current = None;
    }
}

impl RenderSink for FrameRecorder {
    fn begin_scene(&mut self, camera: &CameraUniform) {
        self.current = Some(RecordedFrame {
            camera: Some(*camera),
            sprites: Vec::new(),
        });
    }

    fn draw_sprite(&mut self, instance: &SpriteInstance) {
        // Draws outside a frame are dropped.
        if let Some(frame) = &mut self.current {
            frame.sprites.push(*instance);
        }
    }

    fn end_scene(&mut self) {
        if let Some(frame) = self.current.take() {
            self.frames.push(frame);
        }
    }
}
