use crate::ecs::{Component, ComponentKey};
use crate::gpu::{GpuDevice, IndexFormat, VertexArrayId};

/// Geometry that already lives on the GPU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// `None` renders nothing, e.g. while the geometry is still being built.
    pub vertex_array: Option<VertexArrayId>,
    /// Number of indices to draw.
    pub count: u32,
    pub index_format: IndexFormat,
    /// Whether the vertex array is released together with the mesh.
    pub owned: bool,
}

impl Geometry {
    /// Geometry the mesh will release when its entity is destroyed.
    pub fn owned(vertex_array: VertexArrayId, count: u32, index_format: IndexFormat) -> Self {
        Self {
            vertex_array: Some(vertex_array),
            count,
            index_format,
            owned: true,
        }
    }

    /// Geometry shared between meshes and released by whoever created it.
    pub fn shared(vertex_array: VertexArrayId, count: u32, index_format: IndexFormat) -> Self {
        Self {
            owned: false,
            ..Self::owned(vertex_array, count, index_format)
        }
    }

    pub fn empty() -> Self {
        Self {
            vertex_array: None,
            count: 0,
            index_format: IndexFormat::default(),
            owned: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mesh {
    pub geometry: Geometry,
}

impl Mesh {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry }
    }
}

impl Component for Mesh {
    const KEY: ComponentKey = ComponentKey("kiln.mesh");

    fn dispose(&mut self, device: &dyn GpuDevice) -> anyhow::Result<()> {
        if !self.geometry.owned {
            return Ok(());
        }
        if let Some(vertex_array) = self.geometry.vertex_array.take() {
            device.delete_vertex_array(vertex_array)?;
        }
        Ok(())
    }
}
