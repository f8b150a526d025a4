//! Mesh and vertex data.

use ash::vk;
use lumen_gpu::VertexLayout;

/// Interleaved vertex format: position, normal, uv.
///
/// The struct layout is the wire format the vertex shader consumes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Vertex input layout for the graphics pipeline, binding 0.
    pub fn layout() -> VertexLayout {
        VertexLayout {
            bindings: vec![vk::VertexInputBindingDescription::default()
                .binding(0)
                .stride(std::mem::size_of::<Self>() as u32)
                .input_rate(vk::VertexInputRate::VERTEX)],
            attributes: vec![
                vk::VertexInputAttributeDescription::default()
                    .location(0)
                    .binding(0)
                    .format(vk::Format::R32G32B32_SFLOAT)
                    .offset(std::mem::offset_of!(Self, position) as u32),
                vk::VertexInputAttributeDescription::default()
                    .location(1)
                    .binding(0)
                    .format(vk::Format::R32G32B32_SFLOAT)
                    .offset(std::mem::offset_of!(Self, normal) as u32),
                vk::VertexInputAttributeDescription::default()
                    .location(2)
                    .binding(0)
                    .format(vk::Format::R32G32_SFLOAT)
                    .offset(std::mem::offset_of!(Self, uv) as u32),
            ],
        }
    }
}

/// CPU-side vertex accumulator.
#[derive(Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, vertex: Vertex) {
        self.vertices.push(vertex);
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Raw bytes for upload to a vertex buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::offset_of!(Vertex, position), 0);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 12);
        assert_eq!(std::mem::offset_of!(Vertex, uv), 24);
    }

    #[test]
    fn layout_matches_struct() {
        let layout = Vertex::layout();
        assert_eq!(layout.bindings.len(), 1);
        assert_eq!(layout.bindings[0].stride, 32);
        assert_eq!(layout.attributes.len(), 3);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn mesh_bytes_interleave_vertices() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Vertex {
            position: [1.0, 2.0, 3.0],
            normal: [0.0, 1.0, 0.0],
            uv: [0.5, 0.5],
        });
        mesh.add_vertex(Vertex {
            position: [4.0, 5.0, 6.0],
            normal: [0.0, 0.0, 1.0],
            uv: [1.0, 0.0],
        });

        assert_eq!(mesh.vertex_count(), 2);
        assert_eq!(mesh.as_bytes().len(), 64);

        let floats: &[f32] = bytemuck::cast_slice(mesh.as_bytes());
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[8], 4.0);
    }
}
