use cgmath::Vector3;

use crate::ecs::{Component, ComponentKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LightKind {
    Directional,
    #[default]
    Point,
    Spot,
}

/// A light source. Its placement comes from the entity's transform; how it
/// is shaded is up to the programs that read it.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vector3<f32>,
    pub intensity: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self::new(LightKind::Point, Vector3::new(1.0, 1.0, 1.0), 1.0)
    }
}

impl Component for Light {
    const KEY: ComponentKey = ComponentKey("kiln.light");
}

impl Light {
    pub fn new(kind: LightKind, color: impl Into<Vector3<f32>>, intensity: f32) -> Self {
        Self {
            kind,
            color: color.into(),
            intensity,
        }
    }
}
