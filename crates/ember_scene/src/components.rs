//! # Scene Components
//!
//! The default components every scene understands.
//!
//! `Transform` and `SpriteRenderer` are plain old data so the renderer can
//! copy them straight into instance buffers.

use bytemuck::{Pod, Zeroable};
use ember_core::Component;

/// Column-major 4x4 matrix.
pub type Mat4 = [[f32; 4]; 4];

/// The identity matrix.
pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Multiplies two column-major matrices, `a * b`.
#[must_use]
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (column, out_column) in out.iter_mut().enumerate() {
        for (row, value) in out_column.iter_mut().enumerate() {
            *value = (0..4).map(|k| a[k][row] * b[column][k]).sum();
        }
    }
    out
}

fn translation(offset: [f32; 3]) -> Mat4 {
    let mut m = IDENTITY;
    m[3] = [offset[0], offset[1], offset[2], 1.0];
    m
}

fn rotation_z(angle: f32) -> Mat4 {
    let (sin, cos) = angle.sin_cos();
    let mut m = IDENTITY;
    m[0] = [cos, sin, 0.0, 0.0];
    m[1] = [-sin, cos, 0.0, 0.0];
    m
}

fn scaling(scale: [f32; 2]) -> Mat4 {
    let mut m = IDENTITY;
    m[0][0] = scale[0];
    m[1][1] = scale[1];
    m
}

/// Position, rotation and scale of an entity in the 2D plane.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// World position. `z` orders sprites.
    pub translation: [f32; 3],
    /// Rotation around the z axis, in radians.
    pub rotation: f32,
    /// Scale along x and y.
    pub scale: [f32; 2],
    /// Padding to 32 bytes.
    pub _padding: [f32; 2],
}

impl Component for Transform {}

impl Default for Transform {
    fn default() -> Self {
        Self::from_translation([0.0; 3])
    }
}

impl Transform {
    /// Creates a transform at `translation` with no rotation and unit scale.
    #[inline]
    #[must_use]
    pub const fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            rotation: 0.0,
            scale: [1.0, 1.0],
            _padding: [0.0; 2],
        }
    }

    /// Returns a copy rotated to `rotation` radians.
    #[inline]
    #[must_use]
    pub const fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Returns a copy scaled to `scale`.
    #[inline]
    #[must_use]
    pub const fn with_scale(mut self, scale: [f32; 2]) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix: translation * rotation * scale.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        let rotated = multiply(&translation(self.translation), &rotation_z(self.rotation));
        multiply(&rotated, &scaling(self.scale))
    }

    /// Inverse of [`matrix`](Self::matrix), used as a camera view matrix.
    ///
    /// A zero scale axis is treated as unit scale.
    #[must_use]
    pub fn inverse_matrix(&self) -> Mat4 {
        let inverse_scale = self.scale.map(|s| if s == 0.0 { 1.0 } else { s.recip() });
        let [x, y, z] = self.translation;
        let unrotated = multiply(&scaling(inverse_scale), &rotation_z(-self.rotation));
        multiply(&unrotated, &translation([-x, -y, -z]))
    }
}

/// Orthographic camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Visible height in world units.
    pub size: f32,
    /// Near clip plane.
    pub near: f32,
    /// Far clip plane.
    pub far: f32,
    /// Width over height.
    pub aspect: f32,
    /// The scene renders through the first primary camera it finds.
    pub primary: bool,
    /// Ignore viewport resizes.
    pub fixed_aspect: bool,
}

impl Component for Camera {}

impl Default for Camera {
    fn default() -> Self {
        Self::orthographic(10.0)
    }
}

impl Camera {
    /// Creates a primary orthographic camera showing `size` units vertically.
    #[must_use]
    pub fn orthographic(size: f32) -> Self {
        Self {
            size,
            near: -1.0,
            far: 1.0,
            aspect: 16.0 / 9.0,
            primary: true,
            fixed_aspect: false,
        }
    }

    /// Adapts the aspect ratio to a viewport. A zero height is ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Right-handed orthographic projection with depth in `[0, 1]`.
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        let half_height = self.size * 0.5;
        let half_width = half_height * self.aspect;
        let depth = self.near - self.far;

        [
            [half_width.recip(), 0.0, 0.0, 0.0],
            [0.0, half_height.recip(), 0.0, 0.0],
            [0.0, 0.0, depth.recip(), 0.0],
            [0.0, 0.0, self.near / depth, 1.0],
        ]
    }
}

/// Colored, optionally textured quad.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SpriteRenderer {
    /// Linear RGBA tint.
    pub color: [f32; 4],
    /// Texture repeat factor.
    pub tiling: f32,
    /// Texture slot, 0 for none.
    pub texture: u32,
    /// Padding to 32 bytes.
    pub _padding: [u32; 2],
}

impl Component for SpriteRenderer {}

impl Default for SpriteRenderer {
    fn default() -> Self {
        Self::colored([1.0; 4])
    }
}

impl SpriteRenderer {
    /// Creates an untextured sprite.
    #[inline]
    #[must_use]
    pub const fn colored(color: [f32; 4]) -> Self {
        Self {
            color,
            tiling: 1.0,
            texture: 0,
            _padding: [0; 2],
        }
    }
}

/// Human-readable entity name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tag {
    /// The name.
    pub name: String,
}

impl Component for Tag {}

impl Tag {
    /// Creates a tag.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
