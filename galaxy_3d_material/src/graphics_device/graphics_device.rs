/// GraphicsDevice trait - factory interface for the GPU objects materials need

use std::sync::{Arc, Mutex, MutexGuard};
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, Shader, ShaderDesc, Pipeline, PipelineDesc, ComputePipelineDesc,
    BindingGroup, BindingGroupLayout, BindingGroupLayoutDesc, BindingWrite,
};

/// Graphics device trait
///
/// Implemented by backend-specific devices (e.g. a Vulkan device).
/// Shared by the material system as `Arc<Mutex<dyn GraphicsDevice>>`.
pub trait GraphicsDevice: Send + Sync {
    /// Frame-in-flight slot currently being recorded by the graphics queue
    fn current_frame_index(&self) -> usize;

    /// Frame-in-flight slot recorded one frame earlier
    ///
    /// Compute work runs one frame behind graphics and uses this slot.
    fn last_frame_index(&self) -> usize;

    /// Create a buffer initialized with `data`
    ///
    /// # Arguments
    ///
    /// * `desc` - Buffer descriptor
    /// * `data` - Initial contents (may be shorter than `desc.size`, rest is zeroed)
    fn create_buffer(&mut self, desc: BufferDesc, data: &[u8]) -> Result<Arc<dyn Buffer>>;

    /// Compile a shader
    ///
    /// # Errors
    ///
    /// Returns `Error::ShaderCompilation` if the source does not compile.
    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Create a binding group layout (descriptor set layout)
    fn create_binding_group_layout(&mut self, desc: BindingGroupLayoutDesc) -> Result<Arc<dyn BindingGroupLayout>>;

    /// Allocate a binding group for `layout` at `set_index`
    fn create_binding_group(
        &mut self,
        layout: &Arc<dyn BindingGroupLayout>,
        set_index: u32,
    ) -> Result<Arc<dyn BindingGroup>>;

    /// Create a graphics pipeline
    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Create a compute pipeline
    fn create_compute_pipeline(&mut self, desc: ComputePipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Apply a batch of binding writes
    fn write_binding_groups(&mut self, writes: &[BindingWrite]) -> Result<()>;
}

/// Lock a shared device, mapping a poisoned lock to `Error::BackendError`
pub fn lock_device(device: &Arc<Mutex<dyn GraphicsDevice>>) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
    device.lock()
        .map_err(|_| Error::BackendError("GraphicsDevice lock poisoned".to_string()))
}
