/// BindingGroup traits, layout descriptors and the batched binding writer
///
/// A BindingGroup is Galaxy3D's abstraction over a GPU descriptor set.
/// Material code never writes into a group directly: it registers
/// resources on a `BindingGroupWriter`, and the manager flushes every
/// pending write to the device in one batch per frame.

use std::sync::Arc;
use bitflags::bitflags;
use crate::error::Result;
use crate::graphics_device::{Buffer, Texture, GraphicsDevice};

// ============================================================================
// Binding types and layout description
// ============================================================================

/// Type of resource bound at a given slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    /// Uniform buffer (read-only structured data)
    UniformBuffer,
    /// Combined image sampler (texture + sampler in one binding)
    CombinedImageSampler,
    /// Storage buffer (read/write for compute shaders)
    StorageBuffer,
}

bitflags! {
    /// Shader stage visibility flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x01;
        const FRAGMENT = 0x02;
        const COMPUTE = 0x04;
        const VERTEX_FRAGMENT = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// Description of a single binding slot within a BindingGroupLayout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlotDesc {
    /// Binding number (`[[vk::binding(N, set)]]` in HLSL)
    pub binding: u32,
    /// Type of resource at this binding
    pub binding_type: BindingType,
    /// Shader stages that access this binding
    pub stage_flags: ShaderStageFlags,
}

/// Description of a BindingGroup layout (blueprint for a set of bindings)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingGroupLayoutDesc {
    /// Binding slot descriptions, sorted by binding number
    pub entries: Vec<BindingSlotDesc>,
}

impl BindingGroupLayoutDesc {
    /// Append a slot at the next free binding number
    pub fn append(&mut self, binding_type: BindingType, stage_flags: ShaderStageFlags) -> u32 {
        let binding = self.entries.len() as u32;
        self.entries.push(BindingSlotDesc { binding, binding_type, stage_flags });
        binding
    }
}

// ============================================================================
// Binding resources
// ============================================================================

/// A concrete resource to bind into a BindingGroup
#[derive(Clone)]
pub enum BindingResource {
    /// Uniform buffer binding
    UniformBuffer(Arc<dyn Buffer>),
    /// Sampled texture (sampler resolved by the backend)
    SampledTexture(Arc<dyn Texture>),
    /// Storage buffer binding
    StorageBuffer(Arc<dyn Buffer>),
}

impl std::fmt::Debug for BindingResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingResource::UniformBuffer(buffer) => write!(f, "UniformBuffer({} bytes)", buffer.size()),
            BindingResource::SampledTexture(texture) => write!(f, "SampledTexture({})", texture.info().path),
            BindingResource::StorageBuffer(buffer) => write!(f, "StorageBuffer({} bytes)", buffer.size()),
        }
    }
}

/// One pending descriptor write
#[derive(Clone, Debug)]
pub struct BindingWrite {
    pub group: Arc<dyn BindingGroup>,
    pub binding: u32,
    pub resource: BindingResource,
}

// ============================================================================
// BindingGroup traits
// ============================================================================

/// Backend layout object created from a `BindingGroupLayoutDesc`
pub trait BindingGroupLayout: Send + Sync {
    /// The description this layout was created from
    fn desc(&self) -> &BindingGroupLayoutDesc;
}

/// A set of GPU resource bindings
///
/// Contents are updated through `GraphicsDevice::write_binding_groups`.
pub trait BindingGroup: Send + Sync {
    /// Returns the set index this BindingGroup was created for
    fn set_index(&self) -> u32;
}

impl std::fmt::Debug for dyn BindingGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BindingGroup(set {})", self.set_index())
    }
}

// ============================================================================
// BindingGroupWriter
// ============================================================================

/// Accumulates binding writes until `write` flushes them to the device
#[derive(Default)]
pub struct BindingGroupWriter {
    pending: Vec<BindingWrite>,
}

impl BindingGroupWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_uniform_buffer(&mut self, group: &Arc<dyn BindingGroup>, binding: u32, buffer: &Arc<dyn Buffer>) {
        self.push(group, binding, BindingResource::UniformBuffer(buffer.clone()));
    }

    pub fn register_texture(&mut self, group: &Arc<dyn BindingGroup>, binding: u32, texture: &Arc<dyn Texture>) {
        self.push(group, binding, BindingResource::SampledTexture(texture.clone()));
    }

    pub fn register_storage_buffer(&mut self, group: &Arc<dyn BindingGroup>, binding: u32, buffer: &Arc<dyn Buffer>) {
        self.push(group, binding, BindingResource::StorageBuffer(buffer.clone()));
    }

    fn push(&mut self, group: &Arc<dyn BindingGroup>, binding: u32, resource: BindingResource) {
        self.pending.push(BindingWrite { group: group.clone(), binding, resource });
    }

    /// Pending writes, in registration order
    pub fn pending(&self) -> &[BindingWrite] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Flush all pending writes in one batch
    ///
    /// Pending writes are dropped even if the device rejects the batch.
    pub fn write(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let writes = std::mem::take(&mut self.pending);
        device.write_binding_groups(&writes)
    }

    /// Drop pending writes targeting `group`
    pub fn discard_group(&mut self, group: &Arc<dyn BindingGroup>) {
        self.pending.retain(|write| !Arc::ptr_eq(&write.group, group));
    }
}

#[cfg(test)]
#[path = "binding_group_tests.rs"]
mod tests;
