//! Built-in geometry uploaded straight to the device.
//!
//! Every primitive is centred on the origin, wound counter-clockwise and
//! returned as owned [`Geometry`], released when its mesh is disposed.

use crate::components::Geometry;
use crate::gpu::{GpuDevice, Indices, Vertex};

fn upload(
    device: &dyn GpuDevice,
    vertices: &[Vertex],
    indices: &[u16],
) -> anyhow::Result<Geometry> {
    let indices = Indices::U16(indices);
    let vertex_array = device.create_vertex_array(vertices, indices)?;
    Ok(Geometry::owned(
        vertex_array,
        indices.len() as u32,
        indices.format(),
    ))
}

/// Axis-aligned cube with edge length `size`, one quad per face so every face
/// gets its own normal and full texture.
pub fn cube(device: &dyn GpuDevice, size: f32) -> anyhow::Result<Geometry> {
    let h = size / 2.0;
    // Normal, then the face's right and up axes.
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let corners: [(f32, f32, [f32; 2]); 4] = [
        (-1.0, -1.0, [0.0, 1.0]),
        (1.0, -1.0, [1.0, 1.0]),
        (1.0, 1.0, [1.0, 0.0]),
        (-1.0, 1.0, [0.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, right, up) in faces {
        let base = vertices.len() as u16;
        for (x, y, uv) in corners {
            let position = std::array::from_fn(|i| (normal[i] + right[i] * x + up[i] * y) * h);
            vertices.push(Vertex::new(position, uv, normal));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    upload(device, &vertices, &indices)
}

/// Upright triangle in the XY plane facing +Z.
pub fn triangle(device: &dyn GpuDevice, size: f32) -> anyhow::Result<Geometry> {
    let h = size / 2.0;
    let normal = [0.0, 0.0, 1.0];
    let vertices = [
        Vertex::new([-h, -h, 0.0], [0.0, 1.0], normal),
        Vertex::new([h, -h, 0.0], [1.0, 1.0], normal),
        Vertex::new([0.0, h, 0.0], [0.5, 0.0], normal),
    ];
    upload(device, &vertices, &[0, 1, 2])
}

/// Square in the XY plane facing +Z.
pub fn quad(device: &dyn GpuDevice, size: f32) -> anyhow::Result<Geometry> {
    let h = size / 2.0;
    let normal = [0.0, 0.0, 1.0];
    let vertices = [
        Vertex::new([-h, -h, 0.0], [0.0, 1.0], normal),
        Vertex::new([h, -h, 0.0], [1.0, 1.0], normal),
        Vertex::new([h, h, 0.0], [1.0, 0.0], normal),
        Vertex::new([-h, h, 0.0], [0.0, 0.0], normal),
    ];
    upload(device, &vertices, &[0, 1, 2, 0, 2, 3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::{DeviceCall, HeadlessDevice};

    #[test]
    fn cube_has_a_quad_per_face() {
        let device = HeadlessDevice::new();
        let geometry = cube(&device, 2.0).unwrap();
        assert_eq!(geometry.count, 36);
        assert!(geometry.owned);

        let created = device.calls().into_iter().find_map(|call| match call {
            DeviceCall::CreateVertexArray { vertices, .. } => Some(vertices),
            _ => None,
        });
        assert_eq!(created, Some(24));
    }
}
