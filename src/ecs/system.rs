use std::time::Duration;

use super::ComponentStore;

/// Per-frame logic operating on the component store.
pub trait System {
    fn update(&mut self, dt: Duration, components: &mut ComponentStore);
}

/// A [`System`] backed by a closure.
pub struct FunctionSystem<F>(pub F);

impl<F> System for FunctionSystem<F>
where
    F: FnMut(Duration, &mut ComponentStore),
{
    fn update(&mut self, dt: Duration, components: &mut ComponentStore) {
        (self.0)(dt, components)
    }
}

/// Runs systems in insertion order.
#[derive(Default)]
pub struct SystemManager {
    systems: Vec<Box<dyn System>>,
}

impl std::fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.systems.len())
            .finish()
    }
}

impl SystemManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn add_fn(&mut self, f: impl FnMut(Duration, &mut ComponentStore) + 'static) {
        self.add(FunctionSystem(f));
    }

    pub fn update(&mut self, dt: Duration, components: &mut ComponentStore) {
        for system in &mut self.systems {
            system.update(dt, components);
        }
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
