//! The engine: owns the device, the resource cache, the renderer, the local
//! executor loads run on and the current scene.

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use futures::executor::LocalPool;
use futures::future::RemoteHandle;
use futures::task::LocalSpawnExt;
use instant::Instant;

use crate::config::EngineConfig;
use crate::error::RenderError;
use crate::gpu::GpuDevice;
use crate::render::{FrameStats, Renderer};
use crate::resources::{Fetch, ResourceCache};
use crate::scene::Scene;

pub struct Engine {
    config: EngineConfig,
    device: Rc<dyn GpuDevice>,
    resources: ResourceCache,
    renderer: Renderer,
    pool: LocalPool,
    scene: Option<Scene>,
    last_sweep: Instant,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("resources", &self.resources)
            .field("scene", &self.scene)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(config: EngineConfig, device: Rc<dyn GpuDevice>, fetcher: Rc<dyn Fetch>) -> Self {
        let pool = LocalPool::new();
        let resources = ResourceCache::new(device.clone(), fetcher, pool.spawner());
        Self {
            renderer: Renderer::new(config.clear_colour),
            config,
            device,
            resources,
            pool,
            scene: None,
            last_sweep: Instant::now(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn device(&self) -> &Rc<dyn GpuDevice> {
        &self.device
    }

    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Replace the current scene, returning the previous one.
    pub fn set_scene(&mut self, scene: Scene) -> Option<Scene> {
        self.scene.replace(scene)
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    pub fn take_scene(&mut self) -> Option<Scene> {
        self.scene.take()
    }

    /// Let pending loads make as much progress as they can without blocking,
    /// then sweep stale colour textures if one is due.
    pub fn pump(&mut self) {
        self.pool.run_until_stalled();

        let Some(ttl) = self.config.color_texture_ttl else {
            return;
        };
        if self.last_sweep.elapsed() < self.config.sweep_interval {
            return;
        }
        self.last_sweep = Instant::now();
        self.resources.evict_stale_color_textures(ttl);
    }

    /// Block until `future` completes, driving pending loads meanwhile. Meant
    /// for setup code awaiting its shaders and textures.
    pub fn run_until<F: Future>(&mut self, future: F) -> F::Output {
        self.pool.run_until(future)
    }

    /// Run `future` on the engine's executor. It progresses whenever the
    /// engine is pumped; the handle yields its output.
    pub fn spawn<T: 'static>(
        &self,
        future: impl Future<Output = T> + 'static,
    ) -> anyhow::Result<RemoteHandle<T>> {
        Ok(self.pool.spawner().spawn_local_with_handle(future)?)
    }

    /// Advance one frame: progress loads, update the scene's systems and draw.
    /// Without a scene nothing is drawn.
    pub fn frame(&mut self, dt: Duration) -> Result<Option<FrameStats>, RenderError> {
        self.pump();
        self.step(dt)
    }

    /// Update the scene's systems and draw, leaving pending loads alone. For
    /// callers that already pumped this frame.
    pub fn step(&mut self, dt: Duration) -> Result<Option<FrameStats>, RenderError> {
        let Some(scene) = self.scene.as_mut() else {
            return Ok(None);
        };
        scene.update(dt);
        self.renderer
            .render(scene, self.device.as_ref(), &self.resources)
            .map(Some)
    }

    /// Draw the current scene without pumping loads or running systems.
    pub fn render(&mut self) -> Result<Option<FrameStats>, RenderError> {
        let Some(scene) = self.scene.as_ref() else {
            return Ok(None);
        };
        self.renderer
            .render(scene, self.device.as_ref(), &self.resources)
            .map(Some)
    }

    /// Release the program of `folder` and drop what the uniform cache knew
    /// about it.
    pub fn delete_shader_program(&mut self, folder: &str) -> bool {
        match self.resources.delete_shader_program(folder) {
            Some(program) => {
                self.renderer.invalidate_program(program);
                true
            }
            None => false,
        }
    }

    /// Release every program and forget all cached uniform values.
    pub fn clear_shader_programs(&mut self) {
        for program in self.resources.clear_shader_programs() {
            self.renderer.invalidate_program(program);
        }
    }

    /// Destroy `entity` in the current scene, releasing what its components
    /// own on the device.
    pub fn destroy_entity(&mut self, entity: crate::ecs::Entity) -> bool {
        match self.scene.as_mut() {
            Some(scene) => scene.destroy_entity(entity, self.device.as_ref()),
            None => false,
        }
    }
}
