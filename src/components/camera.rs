use cgmath::{Matrix4, Rad, perspective};

use crate::ecs::{Component, ComponentKey};

/// Perspective camera. The view comes from the entity's [`Transform`].
///
/// [`Transform`]: super::Transform
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Horizontal field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub active: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(90.0, 1.0, 0.1, 1000.0)
    }
}

impl Component for Camera {
    const KEY: ComponentKey = ComponentKey("kiln.camera");
}

impl Camera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            aspect,
            near,
            far,
            active: true,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Vertical field of view matching the horizontal one at `aspect`.
    pub fn fov_y(&self, aspect: f32) -> Rad<f32> {
        let half_x = (self.fov.to_radians() / 2.0).tan();
        Rad(2.0 * (half_x / aspect).atan())
    }

    /// OpenGL style projection (clip z in -1..1). `aspect` overrides the
    /// stored one.
    pub fn projection_matrix(&self, aspect: Option<f32>) -> Matrix4<f32> {
        let aspect = aspect.unwrap_or(self.aspect);
        perspective(self.fov_y(aspect), aspect, self.near, self.far)
    }
}
