//! kiln-ngin
//!
//! A small batching 3D engine for native and WASM targets. Scenes are built
//! from entities and components; every frame the renderer groups the drawable
//! entities by material signature, binds each program once per group and only
//! uploads the uniform values that changed. Textures and shader programs come
//! from a resource cache that loads each URL at most once at a time and lets
//! materials draw with a flat fallback colour until their textures arrive.
//!
//! High-level modules
//! - `ecs`: entities, typed component storage and systems
//! - `components`: transform, camera, light, mesh and material components
//! - `resources`: the deduplicating texture and shader cache plus its loaders
//! - `uniforms`: uniform values and the upload cache that diffs them
//! - `render`: batching and per-frame draw submission
//! - `gpu`: the device seam, with a headless and a wgpu implementation
//! - `engine` / `app`: the per-frame driver and the windowed runner
//!

pub mod app;
pub mod components;
pub mod config;
pub mod context;
pub mod ecs;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod render;
pub mod resources;
pub mod scene;
pub mod systems;
pub mod uniforms;

// Re-exports commonly used types for convenience in downstream code.
pub use components::{Camera, Geometry, Light, LightKind, Material, Mesh, Transform};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{LoadError, RenderError};
pub use gpu::{Color, GpuDevice};
pub use render::{FrameStats, Renderer};
pub use resources::ResourceCache;
pub use scene::Scene;

pub use cgmath;
