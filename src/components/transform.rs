//! Position, rotation and scale of an entity.

use cgmath::{
    Deg, Euler, InnerSpace, Matrix, Matrix3, Matrix4, One, Quaternion, Rad, Rotation, Rotation3,
    Vector3,
};

use crate::ecs::{Component, ComponentKey};

/// Local transformation of an entity. There is no parenting: the local matrix
/// is the world matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Transform {
    const KEY: ComponentKey = ComponentKey("kiln.transform");
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_position(position: impl Into<Vector3<f32>>) -> Self {
        Self {
            position: position.into(),
            ..Self::new()
        }
    }

    pub fn with_scale(mut self, scale: impl Into<Vector3<f32>>) -> Self {
        self.scale = scale.into();
        self
    }

    pub fn set_position(&mut self, position: impl Into<Vector3<f32>>) {
        self.position = position.into();
    }

    pub fn set_scale(&mut self, scale: impl Into<Vector3<f32>>) {
        self.scale = scale.into();
    }

    pub fn set_rotation(&mut self, rotation: Quaternion<f32>) {
        self.rotation = rotation;
    }

    /// Set the rotation from Euler angles in degrees.
    pub fn set_rotation_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quaternion::from(Euler::new(Deg(x), Deg(y), Deg(z)));
    }

    /// The rotation as XYZ Euler angles in degrees.
    pub fn rotation_euler(&self) -> Vector3<f32> {
        let q = self.rotation;
        let (wx, wy, wz) = (q.s * q.v.x, q.s * q.v.y, q.s * q.v.z);
        let (xx, xy, xz) = (q.v.x * q.v.x, q.v.x * q.v.y, q.v.x * q.v.z);
        let (yy, yz, zz) = (q.v.y * q.v.y, q.v.y * q.v.z, q.v.z * q.v.z);
        Vector3::new(
            -(2.0 * (yz - wx)).atan2(1.0 - 2.0 * (xx + yy)).to_degrees(),
            (2.0 * (xz + wy)).clamp(-1.0, 1.0).asin().to_degrees(),
            -(2.0 * (xy - wz)).atan2(1.0 - 2.0 * (yy + zz)).to_degrees(),
        )
    }

    /// Turn so that the local -Z axis points at `target`.
    ///
    /// Does nothing when `target` coincides with the position or lies straight
    /// along `up`.
    pub fn look_at(&mut self, target: impl Into<Vector3<f32>>, up: impl Into<Vector3<f32>>) {
        let dir = target.into() - self.position;
        let up = up.into();
        if dir.magnitude2() <= f32::EPSILON || dir.normalize().cross(up).magnitude2() <= f32::EPSILON
        {
            return;
        }
        // `look_to_rh` yields the inverse rotation (world to view).
        let view = Matrix3::look_to_rh(dir, up);
        self.rotation = Quaternion::from(view.transpose()).normalize();
    }

    /// Rotate by `angle` around `axis`, applied after the current rotation.
    pub fn rotate(&mut self, angle: Rad<f32>, axis: Vector3<f32>) {
        let q = Quaternion::from_axis_angle(axis.normalize(), angle);
        self.rotation = (q * self.rotation).normalize();
    }

    pub fn rotate_x(&mut self, angle: Rad<f32>) {
        self.rotate(angle, Vector3::unit_x());
    }

    pub fn rotate_y(&mut self, angle: Rad<f32>) {
        self.rotate(angle, Vector3::unit_y());
    }

    pub fn rotate_z(&mut self, angle: Rad<f32>) {
        self.rotate(angle, Vector3::unit_z());
    }

    /// Translation * rotation * scale.
    pub fn local_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// World-to-view matrix of a camera sitting at this transform. Scale is
    /// ignored.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let inverse = self.rotation.invert();
        Matrix4::from(inverse) * Matrix4::from_translation(-self.position)
    }
}
