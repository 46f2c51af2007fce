//! WGSL reflection for the wgpu device.
//!
//! Programs keep their loose uniforms in one struct bound at
//! `@group(0) @binding(0)` and their samplers as texture/sampler pairs in
//! `@group(1)`, the sampler sitting one binding after its texture:
//!
//! ```wgsl
//! struct Uniforms { u_model: mat4x4<f32>, u_tint: vec4<f32> }
//! @group(0) @binding(0) var<uniform> uniforms: Uniforms;
//! @group(1) @binding(0) var u_diffuse: texture_2d<f32>;
//! @group(1) @binding(1) var u_diffuse_sampler: sampler;
//! ```
//!
//! Every stage is parsed with `naga` and the layouts are merged by name.

use anyhow::{Context, Result, bail};
use naga::{AddressSpace, ArraySize, ScalarKind, TypeInner, VectorSize};

pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

/// Scalar layout of a uniform struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    /// Columns are padded to 16 bytes.
    Mat3,
    Mat4,
    /// `array<i32, N>` or `array<vec4<i32>, N>`; only the first component of
    /// every element is written.
    IntArray { len: u32, stride: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub kind: MemberKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerSlot {
    pub name: String,
    pub texture_binding: u32,
    pub sampler_binding: u32,
}

/// The reflected interface of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    /// Size of the uniform struct in bytes, 0 if the program has none.
    pub block_size: u32,
    pub members: Vec<UniformMember>,
    pub samplers: Vec<SamplerSlot>,
}

impl ProgramLayout {
    pub fn member(&self, name: &str) -> Option<(usize, &UniformMember)> {
        self.members.iter().enumerate().find(|(_, m)| m.name == name)
    }

    pub fn sampler(&self, name: &str) -> Option<(usize, &SamplerSlot)> {
        self.samplers.iter().enumerate().find(|(_, s)| s.name == name)
    }
}

/// Reflect and merge the layouts of every stage.
pub fn reflect_program(stages: &[&str]) -> Result<ProgramLayout> {
    let mut layout = ProgramLayout::default();
    for (index, source) in stages.iter().enumerate() {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| anyhow::anyhow!("{}", e.emit_to_string(source)))
            .with_context(|| format!("could not parse shader stage {index}"))?;
        merge(&mut layout, reflect_module(&module)?)?;
    }
    Ok(layout)
}

fn merge(into: &mut ProgramLayout, from: ProgramLayout) -> Result<()> {
    into.block_size = into.block_size.max(from.block_size);
    for member in from.members {
        match into.member(&member.name) {
            Some((_, existing)) if *existing != member => {
                bail!("stages disagree on the layout of uniform {}", member.name)
            }
            Some(_) => {}
            None => into.members.push(member),
        }
    }
    for sampler in from.samplers {
        match into.sampler(&sampler.name) {
            Some((_, existing)) if *existing != sampler => {
                bail!("stages disagree on the bindings of sampler {}", sampler.name)
            }
            Some(_) => {}
            None => into.samplers.push(sampler),
        }
    }
    Ok(())
}

fn reflect_module(module: &naga::Module) -> Result<ProgramLayout> {
    let mut layout = ProgramLayout::default();
    let mut textures = Vec::new();
    let mut samplers = Vec::new();

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let inner = &module.types[global.ty].inner;
        match (global.space, binding.group) {
            (AddressSpace::Uniform, UNIFORM_GROUP) if binding.binding == UNIFORM_BINDING => {
                let TypeInner::Struct { members, span } = inner else {
                    bail!("the uniform block must be a struct");
                };
                layout.block_size = *span;
                for member in members {
                    let Some(name) = &member.name else {
                        continue;
                    };
                    let kind = member_kind(module, &module.types[member.ty].inner)
                        .with_context(|| format!("uniform {name} has an unsupported type"))?;
                    layout.members.push(UniformMember {
                        name: name.clone(),
                        offset: member.offset,
                        kind,
                    });
                }
            }
            (AddressSpace::Handle, TEXTURE_GROUP) => match inner {
                TypeInner::Image { .. } => {
                    if let Some(name) = &global.name {
                        textures.push((name.clone(), binding.binding));
                    }
                }
                TypeInner::Sampler { .. } => samplers.push(binding.binding),
                _ => {}
            },
            _ => {}
        }
    }

    for (name, texture_binding) in textures {
        let sampler_binding = texture_binding + 1;
        if !samplers.contains(&sampler_binding) {
            bail!("texture {name} has no sampler at binding {sampler_binding}");
        }
        layout.samplers.push(SamplerSlot {
            name,
            texture_binding,
            sampler_binding,
        });
    }
    layout.samplers.sort_by_key(|s| s.texture_binding);
    Ok(layout)
}

fn member_kind(module: &naga::Module, inner: &TypeInner) -> Result<MemberKind> {
    let kind = match inner {
        TypeInner::Scalar(s) if s.kind == ScalarKind::Float && s.width == 4 => MemberKind::Float,
        TypeInner::Scalar(s) if s.kind == ScalarKind::Sint && s.width == 4 => MemberKind::Int,
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => MemberKind::Vec2,
            VectorSize::Tri => MemberKind::Vec3,
            VectorSize::Quad => MemberKind::Vec4,
        },
        TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            ..
        } => MemberKind::Mat3,
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => MemberKind::Mat4,
        TypeInner::Array {
            base,
            size: ArraySize::Constant(len),
            stride,
        } => match &module.types[*base].inner {
            TypeInner::Scalar(s) if s.kind == ScalarKind::Sint => MemberKind::IntArray {
                len: len.get(),
                stride: *stride,
            },
            TypeInner::Vector { scalar, .. } if scalar.kind == ScalarKind::Sint => {
                MemberKind::IntArray {
                    len: len.get(),
                    stride: *stride,
                }
            }
            other => bail!("unsupported array element {other:?}"),
        },
        other => bail!("unsupported type {other:?}"),
    };
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
struct Uniforms {
    u_model: mat4x4<f32>,
    u_normal: mat3x3<f32>,
    u_time: f32,
}
@group(0) @binding(0) var<uniform> uniforms: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return uniforms.u_model * vec4<f32>(position, uniforms.u_time);
}
"#;

    const FRAGMENT: &str = r#"
struct Uniforms {
    u_model: mat4x4<f32>,
    u_normal: mat3x3<f32>,
    u_time: f32,
}
@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(1) @binding(0) var u_diffuse: texture_2d<f32>;
@group(1) @binding(1) var u_diffuse_sampler: sampler;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSample(u_diffuse, u_diffuse_sampler, vec2<f32>(0.0, 0.0));
}
"#;

    #[test]
    fn reflects_members_with_std140_offsets() {
        let layout = reflect_program(&[VERTEX, FRAGMENT]).unwrap();
        let (_, model) = layout.member("u_model").unwrap();
        let (_, normal) = layout.member("u_normal").unwrap();
        let (_, time) = layout.member("u_time").unwrap();
        assert_eq!((model.offset, model.kind), (0, MemberKind::Mat4));
        assert_eq!((normal.offset, normal.kind), (64, MemberKind::Mat3));
        assert_eq!((time.offset, time.kind), (112, MemberKind::Float));
        assert!(layout.block_size >= 116);
    }

    #[test]
    fn pairs_textures_with_samplers() {
        let layout = reflect_program(&[VERTEX, FRAGMENT]).unwrap();
        assert_eq!(
            layout.samplers,
            vec![SamplerSlot {
                name: "u_diffuse".into(),
                texture_binding: 0,
                sampler_binding: 1,
            }]
        );
    }
}
