//! Grouping drawables that can share GPU state.

use std::collections::HashMap;

use cgmath::{Matrix4, SquareMatrix};

use crate::components::{Material, Mesh, Transform};
use crate::ecs::{ComponentStore, Entity};

/// An entity with everything needed to draw it.
#[derive(Debug)]
pub struct Drawable<'a> {
    pub entity: Entity,
    pub mesh: &'a Mesh,
    pub material: &'a Material,
    pub model: Matrix4<f32>,
}

/// Drawables whose materials share a signature.
#[derive(Debug)]
pub struct Batch<'a> {
    pub signature: String,
    pub drawables: Vec<Drawable<'a>>,
}

impl<'a> Batch<'a> {
    /// The material whose program the whole batch is drawn with.
    pub fn leader(&self) -> Option<&'a Material> {
        self.drawables.first().map(|d| d.material)
    }
}

/// Entities carrying both a [`Mesh`] and a [`Material`], in entity order.
/// Entities without a [`Transform`] are drawn at the origin.
pub fn collect_drawables(components: &ComponentStore) -> Vec<Drawable<'_>> {
    components
        .get_all_of_type::<Mesh>()
        .into_iter()
        .filter_map(|(entity, mesh)| {
            let material = components.get::<Material>(entity)?;
            let model = components
                .get::<Transform>(entity)
                .map_or_else(Matrix4::identity, Transform::local_matrix);
            Some(Drawable {
                entity,
                mesh,
                material,
                model,
            })
        })
        .collect()
}

/// Group `drawables` by material signature. Batches appear in the order their
/// first drawable does and keep the drawables' relative order.
pub fn group_by_signature(drawables: Vec<Drawable<'_>>) -> Vec<Batch<'_>> {
    let mut batches: Vec<Batch<'_>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for drawable in drawables {
        let signature = drawable.material.signature();
        match index.get(&signature) {
            Some(&i) => batches[i].drawables.push(drawable),
            None => {
                index.insert(signature.clone(), batches.len());
                batches.push(Batch {
                    signature,
                    drawables: vec![drawable],
                });
            }
        }
    }
    batches
}
