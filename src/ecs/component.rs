use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use super::Entity;
use crate::gpu::GpuDevice;

/// Stable identity of a component type.
///
/// Assigned by hand so it survives refactors and does not depend on
/// `std::any::type_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey(pub &'static str);

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Plain data attached to an entity.
///
/// ```
/// use kiln_ngin::ecs::{Component, ComponentKey};
///
/// struct Health(u32);
///
/// impl Component for Health {
///     const KEY: ComponentKey = ComponentKey("game.health");
/// }
/// ```
pub trait Component: Any {
    const KEY: ComponentKey;

    /// Release GPU resources the component owns. Called when its entity is
    /// destroyed.
    fn dispose(&mut self, _device: &dyn GpuDevice) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Object-safe view of a [`Component`].
pub trait AnyComponent: Any {
    fn key(&self) -> ComponentKey;
    fn type_name(&self) -> &'static str;
    fn dispose(&mut self, device: &dyn GpuDevice) -> anyhow::Result<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Component> AnyComponent for T {
    fn key(&self) -> ComponentKey {
        T::KEY
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn dispose(&mut self, device: &dyn GpuDevice) -> anyhow::Result<()> {
        Component::dispose(self, device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl fmt::Debug for dyn AnyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.key(), self.type_name())
    }
}

fn collision<T: Component>(found: &dyn AnyComponent) {
    log::warn!(
        "component key {} is declared by both {} and {}",
        T::KEY,
        std::any::type_name::<T>(),
        found.type_name()
    );
}

/// Typed per-entity component storage. At most one component per key and
/// entity.
#[derive(Debug, Default)]
pub struct ComponentStore {
    components: BTreeMap<ComponentKey, BTreeMap<Entity, Box<dyn AnyComponent>>>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `component` to `entity`, returning the one it replaced.
    pub fn add<T: Component>(&mut self, entity: Entity, component: T) -> Option<T> {
        let previous = self
            .components
            .entry(T::KEY)
            .or_default()
            .insert(entity, Box::new(component))?;
        let type_name = previous.type_name();
        match previous.into_any().downcast::<T>() {
            Ok(previous) => Some(*previous),
            Err(_) => {
                log::warn!(
                    "component key {} is declared by both {} and {type_name}",
                    T::KEY,
                    std::any::type_name::<T>()
                );
                None
            }
        }
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let found = self.components.get(&T::KEY)?.get(&entity)?;
        let component = found.as_any().downcast_ref::<T>();
        if component.is_none() {
            collision::<T>(&**found);
        }
        component
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let found = self.components.get_mut(&T::KEY)?.get_mut(&entity)?;
        if !found.as_any().is::<T>() {
            collision::<T>(&**found);
            return None;
        }
        found.as_any_mut().downcast_mut::<T>()
    }

    pub fn contains<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Every component of type `T` with its entity, in entity order.
    pub fn get_all_of_type<T: Component>(&self) -> Vec<(Entity, &T)> {
        let Some(components) = self.components.get(&T::KEY) else {
            return Vec::new();
        };
        components
            .iter()
            .filter_map(|(entity, c)| Some((*entity, c.as_any().downcast_ref::<T>()?)))
            .collect()
    }

    /// Number of entities carrying a `T`.
    pub fn len<T: Component>(&self) -> usize {
        self.components.get(&T::KEY).map_or(0, BTreeMap::len)
    }

    /// Detach and return the `T` of `entity`.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let components = self.components.get_mut(&T::KEY)?;
        if !components.get(&entity)?.as_any().is::<T>() {
            return None;
        }
        let removed = components.remove(&entity)?;
        removed.into_any().downcast::<T>().ok().map(|c| *c)
    }

    /// Detach every component of `entity`, ordered by key.
    pub fn remove_all(&mut self, entity: Entity) -> Vec<Box<dyn AnyComponent>> {
        self.components
            .values_mut()
            .filter_map(|components| components.remove(&entity))
            .collect()
    }

    /// Keys of the components attached to `entity`.
    pub fn keys_of(&self, entity: Entity) -> Vec<ComponentKey> {
        self.components
            .iter()
            .filter(|(_, components)| components.contains_key(&entity))
            .map(|(key, _)| *key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Speed(f32);
    impl Component for Speed {
        const KEY: ComponentKey = ComponentKey("test.speed");
    }

    struct Impostor;
    impl Component for Impostor {
        const KEY: ComponentKey = ComponentKey("test.speed");
    }

    #[test]
    fn colliding_keys_read_as_missing() {
        let mut store = ComponentStore::new();
        let e = Entity(0);
        store.add(e, Speed(1.0));
        assert!(store.get::<Impostor>(e).is_none());
        assert!(store.get_mut::<Impostor>(e).is_none());
        assert!(store.remove::<Impostor>(e).is_none());
        assert_eq!(store.get::<Speed>(e), Some(&Speed(1.0)));
    }
}
