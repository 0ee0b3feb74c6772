/// Pipeline trait and pipeline descriptors

use std::sync::Arc;
use crate::graphics_device::{Shader, BufferFormat, BindingGroupLayout};

/// Primitive topology
///
/// Discriminants are the integer values used in material files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList = 0,
    LineList = 1,
    LineStrip = 2,
    #[default]
    TriangleList = 3,
    TriangleStrip = 4,
    TriangleFan = 5,
}

impl PrimitiveTopology {
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => PrimitiveTopology::PointList,
            1 => PrimitiveTopology::LineList,
            2 => PrimitiveTopology::LineStrip,
            3 => PrimitiveTopology::TriangleList,
            4 => PrimitiveTopology::TriangleStrip,
            5 => PrimitiveTopology::TriangleFan,
            _ => return None,
        })
    }
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    None,
    #[default]
    Back,
    Front,
}

/// Color blending mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// Standard alpha blending (src_alpha, one_minus_src_alpha)
    Alpha,
}

/// Vertex attribute within a vertex binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader location
    pub location: u32,
    /// Data format
    pub format: BufferFormat,
    /// Byte offset within the vertex
    pub offset: u32,
}

/// Vertex layout: one interleaved binding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    /// Stride in bytes
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

/// Descriptor for creating a graphics pipeline
#[derive(Clone)]
pub struct PipelineDesc {
    pub vertex_shader: Arc<dyn Shader>,
    pub fragment_shader: Arc<dyn Shader>,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub blend_mode: BlendMode,
    /// Set layouts in set-index order
    pub binding_group_layouts: Vec<Arc<dyn BindingGroupLayout>>,
    /// Subpass the material domain renders in
    pub subpass: u32,
    /// Color attachment sample count of that subpass
    pub sample_count: u32,
}

/// Descriptor for creating a compute pipeline
#[derive(Clone)]
pub struct ComputePipelineDesc {
    pub shader: Arc<dyn Shader>,
    pub binding_group_layouts: Vec<Arc<dyn BindingGroupLayout>>,
}

/// Compiled pipeline (graphics or compute)
pub trait Pipeline: Send + Sync {}
