use std::collections::BTreeSet;
use std::fmt;

/// Opaque entity handle.
///
/// Ids increase monotonically and are never handed out twice by the same
/// [`EntityManager`], so a stale handle can never alias a newer entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub(crate) u32);

impl Entity {
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out entity ids and tracks which ones are alive.
#[derive(Debug, Default)]
pub struct EntityManager {
    next: u32,
    alive: BTreeSet<Entity>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> Entity {
        let entity = Entity(self.next);
        self.next += 1;
        self.alive.insert(entity);
        entity
    }

    /// Forget `entity`. Returns whether it was alive.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        self.alive.remove(&entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.alive.contains(&entity)
    }

    /// Living entities in creation order.
    pub fn all(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }
}
