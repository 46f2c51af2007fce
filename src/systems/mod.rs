//! Ready-made systems.

mod orbit;

pub use orbit::Orbit;
