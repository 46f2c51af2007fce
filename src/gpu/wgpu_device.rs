//! [`GpuDevice`] on top of `wgpu`.
//!
//! The device mimics an immediate-mode API on top of wgpu's recorded command
//! model. Uniform uploads write into a CPU copy of the current program's
//! uniform block; every draw snapshots that block into a per-frame arena and
//! remembers the textures bound to the program's sampler units. The whole
//! frame is encoded into one render pass at [`GpuDevice::end_frame`], each
//! draw reading its snapshot through a dynamic offset.
//!
//! See [`super::reflect`] for the WGSL interface programs must follow.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::iter;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context as _, anyhow, bail};
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::reflect::{self, MemberKind, ProgramLayout};
use super::texture::Texture;
use super::{
    Color, GpuDevice, IndexFormat, Indices, ProgramId, ShaderSources, TextureId, UniformLocation,
    Vertex, VertexArrayId,
};
use crate::context::Context;

/// Maps WebGL/OpenGL clip space (z in -1..1) onto wgpu's (z in 0..1).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    format: wgpu::IndexFormat,
}

struct GpuProgram {
    layout: ProgramLayout,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    /// CPU copy of the uniform block.
    block: Vec<u8>,
    /// Texture unit feeding each sampler slot.
    sampler_units: Vec<Option<u32>>,
}

#[derive(Debug, Clone, Copy)]
enum LocationTarget {
    Member(usize),
    Sampler(usize),
}

struct RecordedDraw {
    program: ProgramId,
    vertex_array: VertexArrayId,
    count: u32,
    format: IndexFormat,
    uniform_offset: u32,
    textures: Vec<Option<TextureId>>,
}

struct Frame {
    clear: wgpu::Color,
    arena: Vec<u8>,
    draws: Vec<RecordedDraw>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    textures: HashMap<TextureId, Texture>,
    vertex_arrays: HashMap<VertexArrayId, GpuGeometry>,
    programs: HashMap<ProgramId, GpuProgram>,
    locations: Vec<(ProgramId, LocationTarget)>,
    current_program: Option<ProgramId>,
    units: BTreeMap<u32, TextureId>,
    frame: Option<Frame>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// The uniform block of the program in use, if `location` belongs to it.
    fn target(&mut self, location: UniformLocation) -> Option<(&mut GpuProgram, LocationTarget)> {
        let (program, target) = *self.locations.get(location.0 as usize)?;
        if self.current_program != Some(program) {
            log::warn!("uniform upload to program {program} which is not in use");
            return None;
        }
        Some((self.programs.get_mut(&program)?, target))
    }
}

pub struct WgpuDevice {
    ctx: RefCell<Context>,
    placeholder: Texture,
    uniform_alignment: u32,
    state: RefCell<State>,
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice").finish_non_exhaustive()
    }
}

impl WgpuDevice {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        let placeholder = Texture::placeholder(&ctx.device, &ctx.queue)?;
        let uniform_alignment = ctx.device.limits().min_uniform_buffer_offset_alignment;
        Ok(Self {
            ctx: RefCell::new(ctx),
            placeholder,
            uniform_alignment,
            state: RefCell::new(State::default()),
        })
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.ctx.borrow_mut().resize(width, height);
    }

    pub fn request_redraw(&self) {
        self.ctx.borrow().window.request_redraw();
    }

    pub fn window_size(&self) -> (u32, u32) {
        let size = self.ctx.borrow().window.inner_size();
        (size.width, size.height)
    }

    fn write_member(program: &mut GpuProgram, index: usize, bytes: &[u8]) {
        let offset = program.layout.members[index].offset as usize;
        let end = offset + bytes.len();
        if end > program.block.len() {
            log::warn!("uniform write past the end of the uniform block");
            return;
        }
        program.block[offset..end].copy_from_slice(bytes);
    }

    fn write_floats(&self, location: UniformLocation, expected: MemberKind, values: &[f32]) {
        let mut state = self.state.borrow_mut();
        let Some((program, LocationTarget::Member(index))) = state.target(location) else {
            return;
        };
        let kind = program.layout.members[index].kind;
        if kind != expected {
            log::warn!(
                "uniform {} is {kind:?}, not {expected:?}",
                program.layout.members[index].name
            );
            return;
        }
        Self::write_member(program, index, bytemuck::cast_slice(values));
    }

    fn create_pipeline(
        &self,
        ctx: &Context,
        sources: &ShaderSources,
        layout: &ProgramLayout,
        label: &str,
    ) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout, wgpu::BindGroupLayout) {
        let device = &ctx.device;
        let visibility = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;

        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = if layout.block_size > 0 {
            vec![wgpu::BindGroupLayoutEntry {
                binding: reflect::UNIFORM_BINDING,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(layout.block_size as u64),
                },
                count: None,
            }]
        } else {
            Vec::new()
        };
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &uniform_entries,
            label: Some("uniform_bind_group_layout"),
        });

        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = layout
            .samplers
            .iter()
            .flat_map(|slot| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: slot.texture_binding,
                        visibility,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: slot.sampler_binding,
                        visibility,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &texture_entries,
            label: Some("texture_bind_group_layout"),
        });

        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(sources.vertex.as_str().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(sources.fragment.as_str().into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            cache: None,
            label: Some(label),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: Texture::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        (pipeline, uniform_layout, texture_layout)
    }

    fn encode_frame(&self, frame: Frame) -> anyhow::Result<()> {
        let mut ctx = self.ctx.borrow_mut();
        if !ctx.is_surface_configured() {
            return Ok(());
        }
        let output = match ctx.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = (ctx.config.width, ctx.config.height);
                ctx.resize(width, height);
                log::warn!("surface lost, frame skipped");
                return Ok(());
            }
            Err(e) => return Err(anyhow!("could not acquire the surface texture: {e}")),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let state = self.state.borrow();
        let arena = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniform Arena"),
                contents: if frame.arena.is_empty() {
                    &[0u8; 16][..]
                } else {
                    &frame.arena[..]
                },
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut uniform_groups: HashMap<ProgramId, wgpu::BindGroup> = HashMap::new();
        let mut texture_groups: HashMap<(ProgramId, Vec<Option<TextureId>>), wgpu::BindGroup> =
            HashMap::new();
        for draw in &frame.draws {
            let Some(program) = state.programs.get(&draw.program) else {
                continue;
            };
            uniform_groups.entry(draw.program).or_insert_with(|| {
                let entries: Vec<wgpu::BindGroupEntry> = if program.layout.block_size > 0 {
                    vec![wgpu::BindGroupEntry {
                        binding: reflect::UNIFORM_BINDING,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &arena,
                            offset: 0,
                            size: NonZeroU64::new(program.layout.block_size as u64),
                        }),
                    }]
                } else {
                    Vec::new()
                };
                ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &program.uniform_layout,
                    entries: &entries,
                    label: Some("uniform_bind_group"),
                })
            });
            texture_groups
                .entry((draw.program, draw.textures.clone()))
                .or_insert_with(|| {
                    let mut entries = Vec::with_capacity(draw.textures.len() * 2);
                    for (slot, texture) in program.layout.samplers.iter().zip(&draw.textures) {
                        let texture = texture
                            .and_then(|t| state.textures.get(&t))
                            .unwrap_or(&self.placeholder);
                        entries.push(wgpu::BindGroupEntry {
                            binding: slot.texture_binding,
                            resource: wgpu::BindingResource::TextureView(&texture.view),
                        });
                        entries.push(wgpu::BindGroupEntry {
                            binding: slot.sampler_binding,
                            resource: wgpu::BindingResource::Sampler(&texture.sampler),
                        });
                    }
                    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        layout: &program.texture_layout,
                        entries: &entries,
                        label: Some("texture_bind_group"),
                    })
                });
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &frame.draws {
                let (Some(program), Some(geometry)) = (
                    state.programs.get(&draw.program),
                    state.vertex_arrays.get(&draw.vertex_array),
                ) else {
                    log::warn!("skipping a draw whose program or geometry was deleted");
                    continue;
                };
                let (Some(uniforms), Some(textures)) = (
                    uniform_groups.get(&draw.program),
                    texture_groups.get(&(draw.program, draw.textures.clone())),
                ) else {
                    continue;
                };
                if geometry.format != index_format(draw.format) {
                    log::warn!("draw index format differs from the vertex array's");
                }
                render_pass.set_pipeline(&program.pipeline);
                if program.layout.block_size > 0 {
                    render_pass.set_bind_group(0, uniforms, &[draw.uniform_offset]);
                } else {
                    render_pass.set_bind_group(0, uniforms, &[]);
                }
                render_pass.set_bind_group(1, textures, &[]);
                render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                render_pass.set_index_buffer(geometry.index_buffer.slice(..), geometry.format);
                render_pass.draw_indexed(0..draw.count, 0, 0..1);
            }
        }

        ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl GpuDevice for WgpuDevice {
    fn begin_frame(&self, clear: Color) {
        let mut state = self.state.borrow_mut();
        if state.frame.is_some() {
            log::warn!("begin_frame called twice, discarding the unfinished frame");
        }
        state.units.clear();
        state.frame = Some(Frame {
            clear: clear.into(),
            arena: Vec::new(),
            draws: Vec::new(),
        });
    }

    fn end_frame(&self) -> anyhow::Result<()> {
        let frame = self
            .state
            .borrow_mut()
            .frame
            .take()
            .context("end_frame without begin_frame")?;
        self.encode_frame(frame)
    }

    fn aspect_ratio(&self) -> f32 {
        let ctx = self.ctx.borrow();
        ctx.config.width as f32 / ctx.config.height.max(1) as f32
    }

    fn clip_correction(&self) -> cgmath::Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX
    }

    fn create_texture(
        &self,
        width: u32,
        height: u32,
        rgba: &[u8],
        label: &str,
    ) -> anyhow::Result<TextureId> {
        let texture = {
            let ctx = self.ctx.borrow();
            Texture::from_rgba(&ctx.device, &ctx.queue, width, height, rgba, label)?
        };
        let mut state = self.state.borrow_mut();
        let id = TextureId(state.next_id());
        state.textures.insert(id, texture);
        Ok(id)
    }

    fn delete_texture(&self, texture: TextureId) -> anyhow::Result<()> {
        let removed = self
            .state
            .borrow_mut()
            .textures
            .remove(&texture)
            .ok_or_else(|| anyhow!("unknown texture {texture}"))?;
        removed.texture.destroy();
        Ok(())
    }

    fn bind_texture(&self, unit: u32, texture: TextureId) {
        self.state.borrow_mut().units.insert(unit, texture);
    }

    fn unbind_texture(&self, unit: u32) {
        self.state.borrow_mut().units.remove(&unit);
    }

    fn create_vertex_array(
        &self,
        vertices: &[Vertex],
        indices: Indices<'_>,
    ) -> anyhow::Result<VertexArrayId> {
        if indices.is_empty() {
            bail!("a vertex array needs at least one index");
        }
        let geometry = {
            let ctx = self.ctx.borrow();
            let vertex_buffer = ctx
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Vertex Buffer"),
                    contents: bytemuck::cast_slice(vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            // Index buffers must be a multiple of four bytes long.
            let index_bytes: Vec<u8> = match indices {
                Indices::U16(i) => {
                    let mut bytes = bytemuck::cast_slice::<u16, u8>(i).to_vec();
                    bytes.resize(align_to(bytes.len(), 4), 0);
                    bytes
                }
                Indices::U32(i) => bytemuck::cast_slice::<u32, u8>(i).to_vec(),
            };
            let index_buffer = ctx
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Index Buffer"),
                    contents: &index_bytes,
                    usage: wgpu::BufferUsages::INDEX,
                });
            GpuGeometry {
                vertex_buffer,
                index_buffer,
                format: index_format(indices.format()),
            }
        };
        let mut state = self.state.borrow_mut();
        let id = VertexArrayId(state.next_id());
        state.vertex_arrays.insert(id, geometry);
        Ok(id)
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) -> anyhow::Result<()> {
        let removed = self
            .state
            .borrow_mut()
            .vertex_arrays
            .remove(&vertex_array)
            .ok_or_else(|| anyhow!("unknown vertex array {vertex_array}"))?;
        removed.vertex_buffer.destroy();
        removed.index_buffer.destroy();
        Ok(())
    }

    fn create_program(&self, sources: &ShaderSources, label: &str) -> anyhow::Result<ProgramId> {
        if sources.geometry.is_some()
            || sources.tess_control.is_some()
            || sources.tess_eval.is_some()
        {
            log::warn!("program {label}: wgpu has no geometry or tessellation stages, ignoring them");
        }
        let layout = reflect::reflect_program(&[&sources.vertex, &sources.fragment])
            .with_context(|| format!("program {label}"))?;
        let (pipeline, uniform_layout, texture_layout) = {
            let ctx = self.ctx.borrow();
            self.create_pipeline(&ctx, sources, &layout, label)
        };
        let program = GpuProgram {
            block: vec![0; layout.block_size as usize],
            sampler_units: vec![None; layout.samplers.len()],
            layout,
            pipeline,
            uniform_layout,
            texture_layout,
        };
        let mut state = self.state.borrow_mut();
        let id = ProgramId(state.next_id());
        state.programs.insert(id, program);
        log::debug!("created program {id} ({label})");
        Ok(id)
    }

    fn delete_program(&self, program: ProgramId) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        state
            .programs
            .remove(&program)
            .ok_or_else(|| anyhow!("unknown program {program}"))?;
        if state.current_program == Some(program) {
            state.current_program = None;
        }
        Ok(())
    }

    fn use_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        if !state.programs.contains_key(&program) {
            log::warn!("using unknown program {program}");
        }
        state.current_program = Some(program);
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.borrow_mut();
        let layout = &state.programs.get(&program)?.layout;
        let target = match (layout.member(name), layout.sampler(name)) {
            (Some((index, _)), _) => LocationTarget::Member(index),
            (None, Some((index, _))) => LocationTarget::Sampler(index),
            (None, None) => return None,
        };
        let existing = state.locations.iter().position(|(p, t)| {
            *p == program
                && match (t, target) {
                    (LocationTarget::Member(a), LocationTarget::Member(b)) => *a == b,
                    (LocationTarget::Sampler(a), LocationTarget::Sampler(b)) => *a == b,
                    _ => false,
                }
        });
        let index = existing.unwrap_or_else(|| {
            state.locations.push((program, target));
            state.locations.len() - 1
        });
        Some(UniformLocation(index as u32))
    }

    fn uniform_1f(&self, location: UniformLocation, value: f32) {
        self.write_floats(location, MemberKind::Float, &[value]);
    }

    fn uniform_1i(&self, location: UniformLocation, value: i32) {
        let mut state = self.state.borrow_mut();
        match state.target(location) {
            Some((program, LocationTarget::Sampler(slot))) => {
                program.sampler_units[slot] = u32::try_from(value).ok();
            }
            Some((program, LocationTarget::Member(index))) => {
                if program.layout.members[index].kind == MemberKind::Int {
                    Self::write_member(program, index, bytemuck::bytes_of(&value));
                } else {
                    log::warn!("uniform {} is not an int", program.layout.members[index].name);
                }
            }
            None => {}
        }
    }

    fn uniform_1iv(&self, location: UniformLocation, value: &[i32]) {
        let mut state = self.state.borrow_mut();
        let Some((program, LocationTarget::Member(index))) = state.target(location) else {
            return;
        };
        let member = &program.layout.members[index];
        let MemberKind::IntArray { len, stride } = member.kind else {
            log::warn!("uniform {} is not an int array", member.name);
            return;
        };
        let base = member.offset as usize;
        for (i, v) in value.iter().take(len as usize).enumerate() {
            let offset = base + i * stride as usize;
            if let Some(slot) = program.block.get_mut(offset..offset + 4) {
                slot.copy_from_slice(bytemuck::bytes_of(v));
            }
        }
    }

    fn uniform_2f(&self, location: UniformLocation, value: [f32; 2]) {
        self.write_floats(location, MemberKind::Vec2, &value);
    }

    fn uniform_3f(&self, location: UniformLocation, value: [f32; 3]) {
        self.write_floats(location, MemberKind::Vec3, &value);
    }

    fn uniform_4f(&self, location: UniformLocation, value: [f32; 4]) {
        self.write_floats(location, MemberKind::Vec4, &value);
    }

    fn uniform_matrix3(&self, location: UniformLocation, value: &[f32; 9]) {
        let mut padded = [0.0f32; 12];
        for column in 0..3 {
            padded[column * 4..column * 4 + 3].copy_from_slice(&value[column * 3..column * 3 + 3]);
        }
        self.write_floats(location, MemberKind::Mat3, &padded);
    }

    fn uniform_matrix4(&self, location: UniformLocation, value: &[f32; 16]) {
        self.write_floats(location, MemberKind::Mat4, value);
    }

    fn draw_indexed(&self, vertex_array: VertexArrayId, count: u32, format: IndexFormat) {
        let mut state = self.state.borrow_mut();
        let State {
            programs,
            current_program,
            units,
            frame,
            ..
        } = &mut *state;
        let Some(frame) = frame.as_mut() else {
            log::warn!("draw_indexed outside of a frame");
            return;
        };
        let Some((program_id, program)) =
            current_program.and_then(|id| programs.get(&id).map(|p| (id, p)))
        else {
            log::warn!("draw_indexed without a program in use");
            return;
        };

        let uniform_offset = align_to(frame.arena.len(), self.uniform_alignment as usize);
        frame.arena.resize(uniform_offset, 0);
        frame.arena.extend_from_slice(&program.block);

        let textures = program
            .sampler_units
            .iter()
            .map(|unit| unit.and_then(|u| units.get(&u).copied()))
            .collect();
        frame.draws.push(RecordedDraw {
            program: program_id,
            vertex_array,
            count,
            format,
            uniform_offset: uniform_offset as u32,
            textures,
        });
    }
}
