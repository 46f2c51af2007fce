//! Per-frame draw submission.
//!
//! Each frame the renderer collects every entity that has a mesh and a
//! material, groups them by material signature and draws group by group, so
//! programs are bound once per group and the per-camera uniforms are uploaded
//! once per group. Per-entity state still goes through the uniform cache, so
//! values that did not change since the last draw with the same program are not
//! uploaded again.

use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::components::{Camera, DrawContext, Transform};
use crate::error::RenderError;
use crate::gpu::{Color, GpuDevice, ProgramId};
use crate::resources::ResourceCache;
use crate::scene::Scene;
use crate::uniforms::{UniformCache, UniformValue};

pub mod batch;

pub use batch::{Batch, Drawable, collect_drawables, group_by_signature};

pub const U_PROJ: &str = "u_proj";
pub const U_VIEW: &str = "u_view";
pub const U_CAMERA_POS: &str = "u_cameraPos";
pub const U_MODEL: &str = "u_model";

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub batches: usize,
    pub draws: usize,
    pub texture_bindings: usize,
    pub fallback_bindings: usize,
    pub uniform_uploads: u64,
    pub uniform_skips: u64,
}

struct View {
    proj: Matrix4<f32>,
    view: Matrix4<f32>,
    position: Vector3<f32>,
}

#[derive(Debug)]
pub struct Renderer {
    clear_colour: Color,
    uniforms: UniformCache,
}

impl Renderer {
    pub fn new(clear_colour: Color) -> Self {
        Self {
            clear_colour,
            uniforms: UniformCache::new(),
        }
    }

    pub fn clear_colour(&self) -> Color {
        self.clear_colour
    }

    pub fn set_clear_colour(&mut self, colour: Color) {
        self.clear_colour = colour;
    }

    pub fn uniforms(&self) -> &UniformCache {
        &self.uniforms
    }

    /// Forget everything cached for `program`. Must be called when a program
    /// is deleted since the device may hand its id out again.
    pub fn invalidate_program(&mut self, program: ProgramId) {
        self.uniforms.invalidate(program);
    }

    /// Draw one frame of `scene`.
    ///
    /// Fails before touching the device when the scene has no usable camera.
    pub fn render(
        &mut self,
        scene: &Scene,
        device: &dyn GpuDevice,
        resources: &ResourceCache,
    ) -> Result<FrameStats, RenderError> {
        let view = Self::view(scene, device)?;
        let before = self.uniforms.stats();

        device.begin_frame(self.clear_colour);

        let batches = group_by_signature(collect_drawables(scene.components()));
        let mut stats = FrameStats {
            batches: batches.len(),
            ..Default::default()
        };

        for batch in &batches {
            let Some(leader) = batch.leader() else {
                continue;
            };
            let program = leader.shader().id();
            device.use_program(program);
            self.upload(device, program, U_PROJ, view.proj.into());
            self.upload(device, program, U_VIEW, view.view.into());
            self.upload(device, program, U_CAMERA_POS, view.position.into());

            for drawable in &batch.drawables {
                self.upload(device, program, U_MODEL, drawable.model.into());
                let mut ctx = DrawContext {
                    device,
                    resources,
                    uniforms: &mut self.uniforms,
                };
                let bindings = drawable.material.apply_to(&mut ctx);
                stats.texture_bindings += bindings.textures();
                stats.fallback_bindings += bindings.fallbacks();

                let geometry = &drawable.mesh.geometry;
                if let Some(vertex_array) = geometry.vertex_array {
                    device.draw_indexed(vertex_array, geometry.count, geometry.index_format);
                    stats.draws += 1;
                }
            }
        }

        device.end_frame()?;

        let after = self.uniforms.stats();
        stats.uniform_uploads = after.uploads.saturating_sub(before.uploads);
        stats.uniform_skips = after.skipped.saturating_sub(before.skipped);
        log::trace!("{stats:?}");
        Ok(stats)
    }

    fn upload(
        &mut self,
        device: &dyn GpuDevice,
        program: ProgramId,
        name: &str,
        value: UniformValue,
    ) {
        self.uniforms.apply(device, program, name, &value);
    }

    fn view(scene: &Scene, device: &dyn GpuDevice) -> Result<View, RenderError> {
        let entity = scene.active_camera().ok_or(RenderError::NoActiveCamera)?;
        let camera = scene
            .get_component::<Camera>(entity)
            .ok_or(RenderError::MissingCameraComponent(entity))?;
        let (view, position) = match scene.get_component::<Transform>(entity) {
            Some(transform) => (transform.view_matrix(), transform.position),
            None => (Matrix4::identity(), Vector3::new(0.0, 0.0, 0.0)),
        };
        Ok(View {
            proj: device.clip_correction() * camera.projection_matrix(Some(device.aspect_ratio())),
            view,
            position,
        })
    }
}
