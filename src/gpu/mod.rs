//! The GPU device seam.
//!
//! Everything above this module talks to the GPU through [`GpuDevice`], a small
//! object-safe trait shaped after an immediate-mode graphics API: create and
//! delete textures, vertex arrays and programs, bind a program, push uniform
//! values of a fixed arity to it, bind textures to units and submit indexed
//! draws between [`GpuDevice::begin_frame`] and [`GpuDevice::end_frame`].
//!
//! Two implementations ship with the crate:
//!
//! - [`headless::HeadlessDevice`] records every call. It backs the test-suite
//!   and can drive the engine without a window.
//! - [`wgpu_device::WgpuDevice`] renders through `wgpu` into a `winit` surface.
//!
//! All methods take `&self`. The engine is single-threaded and shares the device
//! behind an `Rc`, so implementations keep their mutable state in `RefCell`s.

use std::fmt;

pub mod headless;
pub mod reflect;
pub mod texture;
pub mod wgpu_device;

/// Handle to a texture living on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u64);

/// Handle to a vertex array (vertex + index buffer pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub(crate) u64);

/// Handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub(crate) u64);

/// Device-specific location of a named uniform inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

macro_rules! raw_handle {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// The raw id assigned by the device.
                pub fn raw(&self) -> u64 {
                    u64::from(self.0)
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}
raw_handle!(TextureId, VertexArrayId, ProgramId, UniformLocation);

/// Width of the elements of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    #[default]
    Uint16,
    Uint32,
}

/// Borrowed index data handed to [`GpuDevice::create_vertex_array`].
#[derive(Debug, Clone, Copy)]
pub enum Indices<'a> {
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl Indices<'_> {
    pub fn len(&self) -> usize {
        match self {
            Indices::U16(i) => i.len(),
            Indices::U32(i) => i.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            Indices::U16(_) => IndexFormat::Uint16,
            Indices::U32(_) => IndexFormat::Uint32,
        }
    }
}

/// The single vertex layout the engine draws with.
///
/// Locations: 0 = position, 1 = texture coordinates, 2 = normal.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];

    pub fn new(position: [f32; 3], tex_coords: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            tex_coords,
            normal,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Linear RGBA colour with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Quantise to 8 bits per channel. Out-of-range channels are clamped and
    /// NaN maps to 0, so every colour has exactly one byte representation.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| {
            if v.is_nan() {
                0
            } else {
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        };
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

impl From<[f32; 3]> for Color {
    fn from([r, g, b]: [f32; 3]) -> Self {
        Self::rgb(r, g, b)
    }
}

impl From<Color> for wgpu::Color {
    fn from(c: Color) -> Self {
        wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }
    }
}

/// Source text of every stage of a shader program.
///
/// Vertex and fragment stages are mandatory; the optional stages are passed on
/// to devices that understand them and ignored (with a warning) otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
    pub geometry: Option<String>,
    pub tess_control: Option<String>,
    pub tess_eval: Option<String>,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            ..Default::default()
        }
    }
}

/// The GPU operations the engine consumes.
///
/// Uniform uploads target the program most recently passed to
/// [`use_program`](Self::use_program); texture binds target a texture unit
/// which a sampler uniform then refers to through an integer upload.
pub trait GpuDevice {
    /// Start a frame and clear the colour and depth targets.
    fn begin_frame(&self, clear: Color);

    /// Finish the frame and present it.
    fn end_frame(&self) -> anyhow::Result<()>;

    /// Width over height of the current render target.
    fn aspect_ratio(&self) -> f32;

    /// Matrix applied on top of an OpenGL style projection to land in the
    /// device's clip space.
    fn clip_correction(&self) -> cgmath::Matrix4<f32> {
        cgmath::SquareMatrix::identity()
    }

    /// Upload a tightly packed RGBA8 image.
    fn create_texture(
        &self,
        width: u32,
        height: u32,
        rgba: &[u8],
        label: &str,
    ) -> anyhow::Result<TextureId>;

    fn delete_texture(&self, texture: TextureId) -> anyhow::Result<()>;

    fn bind_texture(&self, unit: u32, texture: TextureId);

    /// Empty `unit`. Samplers pointing at it read no texture.
    fn unbind_texture(&self, unit: u32);

    fn create_vertex_array(
        &self,
        vertices: &[Vertex],
        indices: Indices<'_>,
    ) -> anyhow::Result<VertexArrayId>;

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) -> anyhow::Result<()>;

    /// Compile and link a program.
    fn create_program(&self, sources: &ShaderSources, label: &str) -> anyhow::Result<ProgramId>;

    fn delete_program(&self, program: ProgramId) -> anyhow::Result<()>;

    fn use_program(&self, program: ProgramId);

    /// Resolve a uniform name. `None` means the program does not use it, for
    /// instance because the shader compiler optimised it away.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn uniform_1f(&self, location: UniformLocation, value: f32);
    fn uniform_1i(&self, location: UniformLocation, value: i32);
    fn uniform_1iv(&self, location: UniformLocation, value: &[i32]);
    fn uniform_2f(&self, location: UniformLocation, value: [f32; 2]);
    fn uniform_3f(&self, location: UniformLocation, value: [f32; 3]);
    fn uniform_4f(&self, location: UniformLocation, value: [f32; 4]);
    /// Column-major 3×3 matrix.
    fn uniform_matrix3(&self, location: UniformLocation, value: &[f32; 9]);
    /// Column-major 4×4 matrix.
    fn uniform_matrix4(&self, location: UniformLocation, value: &[f32; 16]);

    /// Draw `count` indexed triangles-list elements from `vertex_array`.
    fn draw_indexed(&self, vertex_array: VertexArrayId, count: u32, format: IndexFormat);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantisation_clamps_and_rounds() {
        assert_eq!(Color::new(1.0, 0.5, 0.0, 1.0).to_rgba8(), [255, 128, 0, 255]);
        assert_eq!(Color::new(2.0, -1.0, f32::NAN, 0.999).to_rgba8(), [255, 0, 0, 255]);
    }

    #[test]
    fn nearly_equal_colours_share_a_key() {
        let a = Color::rgb(0.2, 0.4, 0.6).to_rgba8();
        let b = Color::rgb(0.2001, 0.3999, 0.6).to_rgba8();
        assert_eq!(a, b);
    }

    #[test]
    fn raw_ids_widen_losslessly() {
        assert_eq!(TextureId(u64::MAX).raw(), u64::MAX);
        assert_eq!(UniformLocation(u32::MAX).raw(), u64::from(u32::MAX));
        assert_eq!(ProgramId(3).to_string(), "3");
    }
}
