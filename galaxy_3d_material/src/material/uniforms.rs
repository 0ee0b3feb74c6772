/// Engine-provided uniform blocks
///
/// `GlobalUniform` lives in the global set (set 0, binding 0) and is shared
/// by every material; `MeshUniform` lives in the per-object set (set 1,
/// binding 0). Both are uploaded as raw bytes through bytemuck, so their
/// field order must match the HLSL member lists below.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// HLSL type and member name of one uniform field
pub type UniformMember = (&'static str, &'static str);

/// Per-frame scene data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUniform {
    pub view: Mat4,
    pub projection: Mat4,
    pub inv_view: Mat4,
    pub inv_projection: Mat4,
    /// xyz = world position, w = 1
    pub camera_position: Vec4,
    pub time: f32,
    pub delta_time: f32,
    pub _padding: [f32; 2],
}

impl Default for GlobalUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

impl GlobalUniform {
    pub const HLSL_MEMBERS: &'static [UniformMember] = &[
        ("float4x4", "view"),
        ("float4x4", "projection"),
        ("float4x4", "invView"),
        ("float4x4", "invProjection"),
        ("float4", "cameraPosition"),
        ("float", "time"),
        ("float", "deltaTime"),
        ("float2", "__globalPadding"),
    ];

    pub fn new(view: Mat4, projection: Mat4, camera_position: Vec3) -> Self {
        Self {
            view,
            projection,
            inv_view: view.inverse(),
            inv_projection: projection.inverse(),
            camera_position: camera_position.extend(1.0),
            time: 0.0,
            delta_time: 0.0,
            _padding: [0.0; 2],
        }
    }

    pub fn with_time(mut self, time: f32, delta_time: f32) -> Self {
        self.time = time;
        self.delta_time = delta_time;
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Per-object transform data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshUniform {
    pub model: Mat4,
    /// Transposed inverse of `model`, for normals
    pub inv_trans_model: Mat4,
    pub object_id: u32,
    pub _padding: [u32; 3],
}

impl Default for MeshUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, 0)
    }
}

impl MeshUniform {
    pub const HLSL_MEMBERS: &'static [UniformMember] = &[
        ("float4x4", "model"),
        ("float4x4", "invTransModel"),
        ("uint", "objectID"),
        ("uint3", "__meshPadding"),
    ];

    pub fn new(model: Mat4, object_id: u32) -> Self {
        Self {
            model,
            inv_trans_model: model.inverse().transpose(),
            object_id,
            _padding: [0; 3],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
