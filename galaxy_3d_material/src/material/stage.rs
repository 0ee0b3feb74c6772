/// Material parameter stages and descriptor set indices
///
/// Set layout of every material pipeline:
/// - Set 0: Global set (scene uniform, global textures, input attachments)
/// - Set 1: Per-object set (mesh uniform)
/// - Set 2: Material vertex stage
/// - Set 3: Material fragment stage
/// - Set 4: Material shared stage (vertex + fragment)
/// - Set 5: Compute
/// - Set 6: Compute + vertex
/// - Set 7: Compute + fragment
///
/// A stage's set index equals its discriminant.

use crate::graphics_device::{ShaderStageFlags, TextureFormat};

pub const GLOBAL_SET_INDEX: u32 = 0;
pub const PER_OBJECT_SET_INDEX: u32 = 1;

/// First set index owned by the material (sets below it are shared)
pub const MATERIAL_SET_INDEX_BEGIN: u32 = 2;

/// Shader stage a material parameter or SSBO belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialStage {
    Vertex = 2,
    Fragment = 3,
    Shared = 4,
    Compute = 5,
    ComputeVertex = 6,
    ComputeFragment = 7,
}

impl MaterialStage {
    /// Stages with a set layout on every material
    pub const GRAPHICS: [MaterialStage; 3] = [
        MaterialStage::Vertex,
        MaterialStage::Fragment,
        MaterialStage::Shared,
    ];

    /// Stages with a set layout on materials owning a compute task
    pub const ALL: [MaterialStage; 6] = [
        MaterialStage::Vertex,
        MaterialStage::Fragment,
        MaterialStage::Shared,
        MaterialStage::Compute,
        MaterialStage::ComputeVertex,
        MaterialStage::ComputeFragment,
    ];

    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            2 => MaterialStage::Vertex,
            3 => MaterialStage::Fragment,
            4 => MaterialStage::Shared,
            5 => MaterialStage::Compute,
            6 => MaterialStage::ComputeVertex,
            7 => MaterialStage::ComputeFragment,
            _ => return None,
        })
    }

    /// Descriptor set index of this stage
    pub fn set_index(self) -> u32 {
        self as u32
    }

    /// Numeric value used in generated names (padding members)
    pub fn value(self) -> u32 {
        self as u32
    }

    /// Shader stages that can see this stage's bindings
    pub fn visibility(self) -> ShaderStageFlags {
        match self {
            MaterialStage::Vertex => ShaderStageFlags::VERTEX,
            MaterialStage::Fragment => ShaderStageFlags::FRAGMENT,
            MaterialStage::Shared => ShaderStageFlags::VERTEX_FRAGMENT,
            MaterialStage::Compute => ShaderStageFlags::COMPUTE,
            MaterialStage::ComputeVertex => ShaderStageFlags::COMPUTE | ShaderStageFlags::VERTEX,
            MaterialStage::ComputeFragment => ShaderStageFlags::COMPUTE | ShaderStageFlags::FRAGMENT,
        }
    }

    pub fn is_compute(self) -> bool {
        matches!(self, MaterialStage::Compute | MaterialStage::ComputeVertex | MaterialStage::ComputeFragment)
    }
}

/// Bindings of the global set
///
/// Input attachments follow at `GlobalSetBinding::COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalSetBinding {
    GlobalUniform = 0,
    AmbientTexture = 1,
    ShadowMapTexture = 2,
}

impl GlobalSetBinding {
    pub const COUNT: u32 = 3;

    /// Global textures, in binding order
    pub const TEXTURES: [GlobalSetBinding; 2] = [
        GlobalSetBinding::AmbientTexture,
        GlobalSetBinding::ShadowMapTexture,
    ];

    pub fn binding(self) -> u32 {
        self as u32
    }

    /// Variable name in generated HLSL
    pub fn name(self) -> &'static str {
        match self {
            GlobalSetBinding::GlobalUniform => "GlobalUniform",
            GlobalSetBinding::AmbientTexture => "ambientTexture",
            GlobalSetBinding::ShadowMapTexture => "shadowMapTexture",
        }
    }

    /// Declared pixel format of a global texture
    pub fn texture_format(self) -> TextureFormat {
        match self {
            GlobalSetBinding::ShadowMapTexture => TextureFormat::D32_FLOAT,
            GlobalSetBinding::GlobalUniform | GlobalSetBinding::AmbientTexture => TextureFormat::R8G8B8A8_UNORM,
        }
    }
}

/// Binding of the per-object mesh uniform in set 1
pub const MESH_UNIFORM_BINDING: u32 = 0;

/// Binding of a material stage's packed uniform block
pub const STAGE_UNIFORM_BINDING: u32 = 0;
