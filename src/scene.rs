//! A scene: entities, their components, the systems updating them and the
//! camera the renderer looks through.

use std::time::Duration;

use crate::components::{Camera, Geometry, Light, LightKind, Material, Mesh, Transform};
use crate::ecs::{Component, ComponentStore, Entity, EntityManager, System, SystemManager};
use crate::gpu::GpuDevice;

#[derive(Debug, Default)]
pub struct Scene {
    entities: EntityManager,
    components: ComponentStore,
    systems: SystemManager,
    active_camera: Option<Entity>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new entity with an identity [`Transform`].
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.entities.create();
        self.components.add(entity, Transform::new());
        entity
    }

    /// A new entity with a default [`Camera`]. It is not made active.
    pub fn create_camera(&mut self) -> Entity {
        let entity = self.create_entity();
        self.components.add(entity, Camera::default());
        entity
    }

    pub fn create_light(&mut self, kind: LightKind) -> Entity {
        let entity = self.create_entity();
        self.components.add(
            entity,
            Light {
                kind,
                ..Light::default()
            },
        );
        entity
    }

    /// A drawable entity. Without a material the mesh is kept but not drawn.
    pub fn create_mesh(&mut self, geometry: Geometry, material: Option<Material>) -> Entity {
        let entity = self.create_entity();
        self.components.add(entity, Mesh::new(geometry));
        if let Some(material) = material {
            self.components.add(entity, material);
        }
        entity
    }

    /// Remove `entity` and dispose of its components. Disposal failures are
    /// logged and do not stop the remaining components from being disposed.
    pub fn destroy_entity(&mut self, entity: Entity, device: &dyn GpuDevice) -> bool {
        if !self.entities.destroy(entity) {
            return false;
        }
        for mut component in self.components.remove_all(entity) {
            if let Err(e) = component.dispose(device) {
                log::error!("disposing {component:?} of {entity} failed: {e:#}");
            }
        }
        if self.active_camera == Some(entity) {
            log::warn!("destroyed the active camera {entity}");
            self.active_camera = None;
        }
        true
    }

    /// Every live entity, in creation order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.all()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Attach `component` to `entity`, returning the one it replaced.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Option<T> {
        if !self.entities.contains(entity) {
            log::warn!("adding a component to unknown entity {entity}");
        }
        self.components.add(entity, component)
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.components.get(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut(entity)
    }

    pub fn get_all_of_type<T: Component>(&self) -> Vec<(Entity, &T)> {
        self.components.get_all_of_type()
    }

    /// Detach the `T` of `entity` without disposing of it.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.components.remove(entity)
    }

    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    pub fn add_system(&mut self, system: impl System + 'static) {
        self.systems.add(system);
    }

    pub fn add_fn_system(&mut self, f: impl FnMut(Duration, &mut ComponentStore) + 'static) {
        self.systems.add_fn(f);
    }

    pub fn set_active_camera(&mut self, camera: Entity) {
        if !self.components.contains::<Camera>(camera) {
            log::warn!("{camera} has no camera component yet");
        }
        self.active_camera = Some(camera);
    }

    pub fn clear_active_camera(&mut self) {
        self.active_camera = None;
    }

    pub fn active_camera(&self) -> Option<Entity> {
        self.active_camera
    }

    /// Run every system once, in the order they were added.
    pub fn update(&mut self, dt: Duration) {
        self.systems.update(dt, &mut self.components);
    }
}
