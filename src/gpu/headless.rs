//! A [`GpuDevice`] that renders nothing and remembers everything.
//!
//! Each call is appended to a log of [`DeviceCall`]s and reflected in a set of
//! counters, which lets the engine run without a window and gives tests an exact
//! picture of the GPU traffic a frame produced.
//!
//! Programs expose the uniforms their sources declare with lines of the form
//! `uniform <type> <name>;`. Every other name resolves to no location, just like
//! an uniform the shader compiler optimised away.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, bail};

use super::{
    Color, GpuDevice, IndexFormat, Indices, ProgramId, ShaderSources, TextureId, UniformLocation,
    Vertex, VertexArrayId,
};
use crate::uniforms::UniformValue;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    BeginFrame(Color),
    EndFrame,
    CreateTexture {
        texture: TextureId,
        width: u32,
        height: u32,
        label: String,
    },
    DeleteTexture(TextureId),
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    UnbindTexture(u32),
    CreateVertexArray {
        vertex_array: VertexArrayId,
        vertices: usize,
        indices: usize,
    },
    DeleteVertexArray(VertexArrayId),
    CreateProgram {
        program: ProgramId,
        label: String,
    },
    DeleteProgram(ProgramId),
    UseProgram(ProgramId),
    Uniform {
        program: ProgramId,
        name: String,
        value: UniformValue,
    },
    DrawIndexed {
        vertex_array: VertexArrayId,
        count: u32,
        format: IndexFormat,
    },
}

/// Counters over the device's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub frames: u64,
    pub textures_created: u64,
    pub textures_deleted: u64,
    pub texture_binds: u64,
    pub vertex_arrays_created: u64,
    pub vertex_arrays_deleted: u64,
    pub programs_created: u64,
    pub programs_deleted: u64,
    pub program_binds: u64,
    pub uniform_uploads: u64,
    pub draws: u64,
}

/// What a draw call sampled: each sampler of the program in use with the
/// texture on the unit it pointed at.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: Option<ProgramId>,
    pub vertex_array: VertexArrayId,
    pub samplers: Vec<(String, Option<TextureId>)>,
}

impl DrawRecord {
    pub fn sampled(&self, sampler: &str) -> Option<TextureId> {
        self.samplers
            .iter()
            .find(|(name, _)| name == sampler)
            .and_then(|(_, texture)| *texture)
    }
}

#[derive(Debug)]
struct TextureData {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

#[derive(Debug)]
struct ProgramData {
    label: String,
    declared: Vec<String>,
    samplers: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    textures: HashMap<TextureId, TextureData>,
    vertex_arrays: HashMap<VertexArrayId, usize>,
    programs: HashMap<ProgramId, ProgramData>,
    /// Location index -> owning program and uniform name.
    locations: Vec<(ProgramId, String)>,
    current_program: Option<ProgramId>,
    bound_textures: BTreeMap<u32, TextureId>,
    uniform_values: HashMap<(ProgramId, String), UniformValue>,
    calls: Vec<DeviceCall>,
    draws: Vec<DrawRecord>,
    stats: DeviceStats,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recording device used by tests and windowless runs.
#[derive(Debug)]
pub struct HeadlessDevice {
    state: RefCell<State>,
    aspect_ratio: Cell<f32>,
    fail_deletes: Cell<bool>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            aspect_ratio: Cell::new(1.0),
            fail_deletes: Cell::new(false),
        }
    }

    pub fn set_aspect_ratio(&self, aspect_ratio: f32) {
        self.aspect_ratio.set(aspect_ratio);
    }

    /// Make every following `delete_*` call fail without releasing anything.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.set(fail);
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.borrow().calls.clone()
    }

    /// Return the recorded calls and start a fresh log.
    pub fn take_calls(&self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    pub fn stats(&self) -> DeviceStats {
        self.state.borrow().stats
    }

    pub fn texture_pixels(&self, texture: TextureId) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .map(|t| t.rgba.clone())
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .map(|t| (t.width, t.height))
    }

    pub fn is_texture_alive(&self, texture: TextureId) -> bool {
        self.state.borrow().textures.contains_key(&texture)
    }

    pub fn is_vertex_array_alive(&self, vertex_array: VertexArrayId) -> bool {
        self.state.borrow().vertex_arrays.contains_key(&vertex_array)
    }

    pub fn is_program_alive(&self, program: ProgramId) -> bool {
        self.state.borrow().programs.contains_key(&program)
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn program_label(&self, program: ProgramId) -> Option<String> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.label.clone())
    }

    /// The value the device currently holds for a uniform of `program`.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.state
            .borrow()
            .uniform_values
            .get(&(program, name.to_owned()))
            .cloned()
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.state.borrow().bound_textures.get(&unit).copied()
    }

    /// Every draw so far, in submission order.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.borrow().draws.clone()
    }

    fn record_uniform(&self, location: UniformLocation, value: UniformValue) {
        let mut state = self.state.borrow_mut();
        let Some((program, name)) = state.locations.get(location.0 as usize).cloned() else {
            log::warn!("uniform upload to unknown location {location}");
            return;
        };
        if state.current_program != Some(program) {
            log::warn!("uniform {name} uploaded while program {program} is not in use");
            return;
        }
        state.stats.uniform_uploads += 1;
        state
            .uniform_values
            .insert((program, name.clone()), value.clone());
        state.calls.push(DeviceCall::Uniform {
            program,
            name,
            value,
        });
    }

    fn check_delete(&self, what: &str) -> anyhow::Result<()> {
        if self.fail_deletes.get() {
            bail!("injected failure deleting {what}");
        }
        Ok(())
    }
}

/// Names declared as `uniform <type> <name>;` in any stage, and the subset
/// whose type is a sampler.
fn declared_uniforms(sources: &ShaderSources) -> (Vec<String>, Vec<String>) {
    let stages = [
        Some(&sources.vertex),
        Some(&sources.fragment),
        sources.geometry.as_ref(),
        sources.tess_control.as_ref(),
        sources.tess_eval.as_ref(),
    ];
    let mut names: Vec<String> = Vec::new();
    let mut samplers: Vec<String> = Vec::new();
    for source in stages.into_iter().flatten() {
        for line in source.lines() {
            let Some(rest) = line.trim().strip_prefix("uniform ") else {
                continue;
            };
            let Some(decl) = rest.trim().strip_suffix(';') else {
                continue;
            };
            let mut parts = decl.split_whitespace();
            let (Some(ty), Some(name)) = (parts.next(), parts.next()) else {
                continue;
            };
            let name = name.split('[').next().unwrap_or(name);
            if names.iter().any(|n| n == name) {
                continue;
            }
            names.push(name.to_owned());
            if ty.starts_with("sampler") {
                samplers.push(name.to_owned());
            }
        }
    }
    (names, samplers)
}

impl GpuDevice for HeadlessDevice {
    fn begin_frame(&self, clear: Color) {
        let mut state = self.state.borrow_mut();
        state.stats.frames += 1;
        state.calls.push(DeviceCall::BeginFrame(clear));
    }

    fn end_frame(&self) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        state.bound_textures.clear();
        state.calls.push(DeviceCall::EndFrame);
        Ok(())
    }

    fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio.get()
    }

    fn create_texture(
        &self,
        width: u32,
        height: u32,
        rgba: &[u8],
        label: &str,
    ) -> anyhow::Result<TextureId> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            bail!(
                "texture {label}: expected {expected} bytes for {width}x{height}, got {}",
                rgba.len()
            );
        }
        let mut state = self.state.borrow_mut();
        let texture = TextureId(state.next_id());
        state.textures.insert(
            texture,
            TextureData {
                width,
                height,
                rgba: rgba.to_vec(),
            },
        );
        state.stats.textures_created += 1;
        state.calls.push(DeviceCall::CreateTexture {
            texture,
            width,
            height,
            label: label.to_owned(),
        });
        Ok(texture)
    }

    fn delete_texture(&self, texture: TextureId) -> anyhow::Result<()> {
        self.check_delete("a texture")?;
        let mut state = self.state.borrow_mut();
        state
            .textures
            .remove(&texture)
            .ok_or_else(|| anyhow!("unknown texture {texture}"))?;
        state.stats.textures_deleted += 1;
        state.calls.push(DeviceCall::DeleteTexture(texture));
        Ok(())
    }

    fn bind_texture(&self, unit: u32, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        if !state.textures.contains_key(&texture) {
            log::warn!("binding unknown texture {texture} to unit {unit}");
        }
        state.bound_textures.insert(unit, texture);
        state.stats.texture_binds += 1;
        state.calls.push(DeviceCall::BindTexture { unit, texture });
    }

    fn unbind_texture(&self, unit: u32) {
        let mut state = self.state.borrow_mut();
        state.bound_textures.remove(&unit);
        state.calls.push(DeviceCall::UnbindTexture(unit));
    }

    fn create_vertex_array(
        &self,
        vertices: &[Vertex],
        indices: Indices<'_>,
    ) -> anyhow::Result<VertexArrayId> {
        let mut state = self.state.borrow_mut();
        let vertex_array = VertexArrayId(state.next_id());
        state.vertex_arrays.insert(vertex_array, indices.len());
        state.stats.vertex_arrays_created += 1;
        state.calls.push(DeviceCall::CreateVertexArray {
            vertex_array,
            vertices: vertices.len(),
            indices: indices.len(),
        });
        Ok(vertex_array)
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) -> anyhow::Result<()> {
        self.check_delete("a vertex array")?;
        let mut state = self.state.borrow_mut();
        state
            .vertex_arrays
            .remove(&vertex_array)
            .ok_or_else(|| anyhow!("unknown vertex array {vertex_array}"))?;
        state.stats.vertex_arrays_deleted += 1;
        state.calls.push(DeviceCall::DeleteVertexArray(vertex_array));
        Ok(())
    }

    fn create_program(&self, sources: &ShaderSources, label: &str) -> anyhow::Result<ProgramId> {
        if sources.vertex.trim().is_empty() || sources.fragment.trim().is_empty() {
            bail!("program {label}: vertex and fragment stages must not be empty");
        }
        let (declared, samplers) = declared_uniforms(sources);
        let mut state = self.state.borrow_mut();
        let program = ProgramId(state.next_id());
        state.programs.insert(
            program,
            ProgramData {
                label: label.to_owned(),
                declared,
                samplers,
            },
        );
        state.stats.programs_created += 1;
        state.calls.push(DeviceCall::CreateProgram {
            program,
            label: label.to_owned(),
        });
        Ok(program)
    }

    fn delete_program(&self, program: ProgramId) -> anyhow::Result<()> {
        self.check_delete("a program")?;
        let mut state = self.state.borrow_mut();
        state
            .programs
            .remove(&program)
            .ok_or_else(|| anyhow!("unknown program {program}"))?;
        state.uniform_values.retain(|(p, _), _| *p != program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
        state.stats.programs_deleted += 1;
        state.calls.push(DeviceCall::DeleteProgram(program));
        Ok(())
    }

    fn use_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        if !state.programs.contains_key(&program) {
            log::warn!("using unknown program {program}");
        }
        state.current_program = Some(program);
        state.stats.program_binds += 1;
        state.calls.push(DeviceCall::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.borrow_mut();
        if !state.programs.get(&program)?.declared.iter().any(|n| n == name) {
            return None;
        }
        if let Some(index) = state
            .locations
            .iter()
            .position(|(p, n)| *p == program && n == name)
        {
            return Some(UniformLocation(index as u32));
        }
        state.locations.push((program, name.to_owned()));
        Some(UniformLocation((state.locations.len() - 1) as u32))
    }

    fn uniform_1f(&self, location: UniformLocation, value: f32) {
        self.record_uniform(location, UniformValue::Float(value));
    }

    fn uniform_1i(&self, location: UniformLocation, value: i32) {
        self.record_uniform(location, UniformValue::Int(value));
    }

    fn uniform_1iv(&self, location: UniformLocation, value: &[i32]) {
        self.record_uniform(location, UniformValue::IntArray(value.to_vec()));
    }

    fn uniform_2f(&self, location: UniformLocation, value: [f32; 2]) {
        self.record_uniform(location, UniformValue::Vec2(value));
    }

    fn uniform_3f(&self, location: UniformLocation, value: [f32; 3]) {
        self.record_uniform(location, UniformValue::Vec3(value));
    }

    fn uniform_4f(&self, location: UniformLocation, value: [f32; 4]) {
        self.record_uniform(location, UniformValue::Vec4(value));
    }

    fn uniform_matrix3(&self, location: UniformLocation, value: &[f32; 9]) {
        self.record_uniform(location, UniformValue::Mat3(*value));
    }

    fn uniform_matrix4(&self, location: UniformLocation, value: &[f32; 16]) {
        self.record_uniform(location, UniformValue::Mat4(*value));
    }

    fn draw_indexed(&self, vertex_array: VertexArrayId, count: u32, format: IndexFormat) {
        let mut state = self.state.borrow_mut();
        if !state.vertex_arrays.contains_key(&vertex_array) {
            log::warn!("drawing unknown vertex array {vertex_array}");
        }
        state.stats.draws += 1;
        let program = state.current_program;
        let samplers = program
            .and_then(|program| state.programs.get(&program).map(|p| (program, p)))
            .map(|(program, data)| {
                data.samplers
                    .iter()
                    .map(|name| {
                        let texture = match state.uniform_values.get(&(program, name.clone())) {
                            Some(UniformValue::Int(unit)) => u32::try_from(*unit)
                                .ok()
                                .and_then(|unit| state.bound_textures.get(&unit).copied()),
                            _ => None,
                        };
                        (name.clone(), texture)
                    })
                    .collect()
            })
            .unwrap_or_default();
        state.draws.push(DrawRecord {
            program,
            vertex_array,
            samplers,
        });
        state.calls.push(DeviceCall::DrawIndexed {
            vertex_array,
            count,
            format,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_declared_uniforms_resolve() {
        let device = HeadlessDevice::new();
        let sources = ShaderSources::new(
            "uniform mat4 u_model;\nuniform mat4 u_view;\nvoid main() {}",
            "uniform sampler2D u_lights[4];\nvoid main() {}",
        );
        let program = device.create_program(&sources, "test").unwrap();
        assert!(device.uniform_location(program, "u_model").is_some());
        assert!(device.uniform_location(program, "u_lights").is_some());
        assert!(device.uniform_location(program, "u_missing").is_none());
        assert_eq!(
            device.uniform_location(program, "u_view"),
            device.uniform_location(program, "u_view")
        );
    }

    #[test]
    fn injected_delete_failures_keep_the_resource() {
        let device = HeadlessDevice::new();
        let texture = device.create_texture(1, 1, &[0, 0, 0, 255], "t").unwrap();
        device.fail_deletes(true);
        assert!(device.delete_texture(texture).is_err());
        assert!(device.is_texture_alive(texture));
        device.fail_deletes(false);
        device.delete_texture(texture).unwrap();
        assert!(!device.is_texture_alive(texture));
    }
}
