//! The component types the engine itself understands.

pub mod camera;
pub mod light;
pub mod material;
pub mod mesh;
pub mod transform;

pub use camera::Camera;
pub use light::{Light, LightKind};
pub use material::{DrawContext, Material, MaterialBindings};
pub use mesh::{Geometry, Mesh};
pub use transform::Transform;
