//! Materials: a program plus the values and textures it is drawn with.
//!
//! Textures are referenced by URL and resolved through the resource cache at
//! draw time. A texture that is not loaded yet is requested in the background
//! and, for this draw, replaced by a 1×1 texture of the sampler's fallback
//! colour, or left unbound when no fallback is declared.

use std::collections::{BTreeMap, HashMap};

use crate::ecs::{Component, ComponentKey};
use crate::gpu::{Color, GpuDevice, TextureId};
use crate::resources::{ResourceCache, ShaderProgram};
use crate::uniforms::{UniformCache, UniformUpload, UniformValue};

/// What a draw needs to apply a material.
pub struct DrawContext<'a> {
    pub device: &'a dyn GpuDevice,
    pub resources: &'a ResourceCache,
    pub uniforms: &'a mut UniformCache,
}

/// How one sampler was resolved for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerBinding {
    /// The loaded texture is bound to `unit`.
    Texture { unit: u32, texture: TextureId },
    /// The texture is not ready; the fallback colour texture is bound instead.
    Fallback { unit: u32, texture: TextureId },
    /// Neither a loaded texture nor a fallback exists. The sampler points at
    /// an emptied unit past the bound ones.
    Unbound,
}

/// Outcome of [`Material::apply_to`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialBindings {
    /// Every sampler in declaration order.
    pub samplers: Vec<(String, SamplerBinding)>,
    pub uploaded: u32,
    pub unchanged: u32,
}

impl MaterialBindings {
    fn count(&self, f: impl Fn(&SamplerBinding) -> bool) -> usize {
        self.samplers.iter().filter(|(_, b)| f(b)).count()
    }

    pub fn textures(&self) -> usize {
        self.count(|b| matches!(b, SamplerBinding::Texture { .. }))
    }

    pub fn fallbacks(&self) -> usize {
        self.count(|b| matches!(b, SamplerBinding::Fallback { .. }))
    }

    pub fn unbound(&self) -> usize {
        self.count(|b| matches!(b, SamplerBinding::Unbound))
    }

    pub fn binding(&self, sampler: &str) -> Option<SamplerBinding> {
        self.samplers
            .iter()
            .find(|(name, _)| name == sampler)
            .map(|(_, b)| *b)
    }

    fn record(&mut self, upload: UniformUpload) {
        match upload {
            UniformUpload::Uploaded => self.uploaded += 1,
            UniformUpload::Unchanged => self.unchanged += 1,
            UniformUpload::Absent => {}
        }
    }
}

#[derive(Clone, Debug)]
pub struct Material {
    shader: ShaderProgram,
    uniforms: BTreeMap<String, UniformValue>,
    /// Sampler name and texture URL, in declaration order.
    textures: Vec<(String, String)>,
    fallbacks: HashMap<String, Color>,
}

impl Component for Material {
    const KEY: ComponentKey = ComponentKey("kiln.material");
}

impl Material {
    pub fn new(shader: ShaderProgram) -> Self {
        Self {
            shader,
            uniforms: BTreeMap::new(),
            textures: Vec::new(),
            fallbacks: HashMap::new(),
        }
    }

    pub fn shader(&self) -> &ShaderProgram {
        &self.shader
    }

    pub fn set_shader(&mut self, shader: ShaderProgram) {
        self.shader = shader;
    }

    pub fn set_uniform(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        self.uniforms.insert(name.into(), value.into());
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn remove_uniform(&mut self, name: &str) -> Option<UniformValue> {
        self.uniforms.remove(name)
    }

    /// Sample the texture at `url` through the sampler `name`. Re-declaring a
    /// sampler keeps its position.
    pub fn set_texture_uniform(&mut self, name: impl Into<String>, url: impl Into<String>) {
        let (name, url) = (name.into(), url.into());
        match self.textures.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = url,
            None => self.textures.push((name, url)),
        }
    }

    pub fn texture_uniform(&self, name: &str) -> Option<&str> {
        self.textures
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, url)| url.as_str())
    }

    pub fn remove_texture_uniform(&mut self, name: &str) -> Option<String> {
        let index = self.textures.iter().position(|(n, _)| n == name)?;
        Some(self.textures.remove(index).1)
    }

    /// Colour substituted for sampler `name` while its texture is loading.
    pub fn set_fallback(&mut self, name: impl Into<String>, color: impl Into<Color>) {
        self.fallbacks.insert(name.into(), color.into());
    }

    pub fn fallback(&self, name: &str) -> Option<Color> {
        self.fallbacks.get(name).copied()
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.textures.iter().map(|(n, u)| (n.as_str(), u.as_str()))
    }

    /// Key grouping materials that bind identically: the program plus the
    /// sorted uniform and sampler names. Values do not take part.
    pub fn signature(&self) -> String {
        let uniforms: Vec<&str> = self.uniforms.keys().map(String::as_str).collect();
        let mut textures: Vec<&str> = self.textures.iter().map(|(n, _)| n.as_str()).collect();
        textures.sort_unstable();
        format!(
            "{}|u:{}|t:{}",
            self.shader.id(),
            uniforms.join(","),
            textures.join(",")
        )
    }

    /// Upload the uniforms and bind the textures of this material to the
    /// program in use.
    ///
    /// Units are handed out from 0 in declaration order, and only to samplers
    /// that actually get a texture. Samplers left without one point at the
    /// next unit, which is emptied, so they never read a texture bound by an
    /// earlier draw.
    pub fn apply_to(&self, ctx: &mut DrawContext<'_>) -> MaterialBindings {
        let program = self.shader.id();
        let mut bindings = MaterialBindings::default();

        for (name, value) in &self.uniforms {
            let upload = ctx.uniforms.apply(ctx.device, program, name, value);
            bindings.record(upload);
        }

        let mut unit = 0u32;
        let mut unbound = Vec::new();
        for (name, url) in &self.textures {
            let binding = match ctx.resources.get_texture(url) {
                Some(texture) => SamplerBinding::Texture { unit, texture },
                None => {
                    ctx.resources.request_texture(url);
                    self.fallback_binding(ctx, name, unit)
                }
            };
            match binding {
                SamplerBinding::Texture { texture, .. } | SamplerBinding::Fallback { texture, .. } => {
                    ctx.device.bind_texture(unit, texture);
                    let upload =
                        ctx.uniforms
                            .apply(ctx.device, program, name, &UniformValue::Int(unit as i32));
                    bindings.record(upload);
                    unit += 1;
                }
                SamplerBinding::Unbound => unbound.push(name.as_str()),
            }
            bindings.samplers.push((name.clone(), binding));
        }

        if !unbound.is_empty() {
            ctx.device.unbind_texture(unit);
            for name in unbound {
                let upload =
                    ctx.uniforms
                        .apply(ctx.device, program, name, &UniformValue::Int(unit as i32));
                bindings.record(upload);
            }
        }
        bindings
    }

    fn fallback_binding(&self, ctx: &DrawContext<'_>, name: &str, unit: u32) -> SamplerBinding {
        let Some(color) = self.fallbacks.get(name) else {
            return SamplerBinding::Unbound;
        };
        match ctx.resources.get_or_create_color_texture(*color) {
            Ok(texture) => SamplerBinding::Fallback { unit, texture },
            Err(e) => {
                log::warn!("no fallback for sampler {name}: {e}");
                SamplerBinding::Unbound
            }
        }
    }
}
