use bytemuck::{Pod, Zeroable};

/// Frame-wide vertex format shared by every program.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Logical pixels.
    pub position: [f32; 2],
    /// Normalized texture coordinates in the physical texture.
    pub uv: [f32; 2],
    /// Premultiplied tint.
    pub color: [f32; 4],
    /// Texture slot within the batch.
    pub slot: u32,
}

impl Vertex {
    pub const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x4,
        3 => Uint32,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

pub(crate) const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];
