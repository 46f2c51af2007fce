use std::time::Duration;

use cgmath::Vector3;

use crate::components::Transform;
use crate::ecs::{ComponentStore, Entity, System};

/// Moves an entity on a circle around a target entity and keeps it facing the
/// target.
///
/// Angles are in degrees. `elevation` lifts the circle above (positive) or
/// below the target. The target's position is re-read every update, so the
/// orbit follows a moving target.
#[derive(Debug, Clone, PartialEq)]
pub struct Orbit {
    pub entity: Entity,
    pub target: Entity,
    pub radius: f32,
    pub azimuth: f32,
    pub elevation: f32,
    /// Degrees per second.
    pub speed: f32,
}

impl Orbit {
    pub fn new(entity: Entity, target: Entity, radius: f32, speed: f32) -> Self {
        Self {
            entity,
            target,
            radius,
            azimuth: 0.0,
            elevation: 0.0,
            speed,
        }
    }

    pub fn with_elevation(mut self, elevation: f32) -> Self {
        self.elevation = elevation;
        self
    }

    /// Offset from the target at the current angles.
    pub fn offset(&self) -> Vector3<f32> {
        let (sin_az, cos_az) = self.azimuth.to_radians().sin_cos();
        let (sin_el, cos_el) = self.elevation.to_radians().sin_cos();
        Vector3::new(
            self.radius * cos_el * sin_az,
            self.radius * sin_el,
            self.radius * cos_el * cos_az,
        )
    }
}

impl System for Orbit {
    fn update(&mut self, dt: Duration, components: &mut ComponentStore) {
        self.azimuth = (self.azimuth + self.speed * dt.as_secs_f32()).rem_euclid(360.0);

        let Some(target) = components.get::<Transform>(self.target).map(|t| t.position) else {
            log::trace!("orbit target {} has no transform", self.target);
            return;
        };
        let offset = self.offset();
        let Some(transform) = components.get_mut::<Transform>(self.entity) else {
            return;
        };
        transform.set_position(target + offset);
        transform.look_at(target, Vector3::unit_y());
    }
}
