//! Entity/component storage and per-frame systems.
//!
//! Entities are bare ids. Components live in a [`ComponentStore`] keyed by a
//! stable [`ComponentKey`] every component type declares, and [`System`]s
//! mutate the store once per frame in the order they were added.

mod component;
mod entity;
mod system;

pub use component::{AnyComponent, Component, ComponentKey, ComponentStore};
pub use entity::{Entity, EntityManager};
pub use system::{FunctionSystem, System, SystemManager};
