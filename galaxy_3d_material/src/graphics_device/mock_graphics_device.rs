/// Mock graphics device for unit tests (no GPU required)
///
/// Records every object it creates and every binding write it receives so
/// tests can assert on what the material system asked the GPU to do.
/// Also hosts the mock collaborators (render pass, synchronizer, texture pool).

use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::asset::TexturePool;
use crate::graphics_device::{
    GraphicsDevice, Buffer, BufferDesc, Texture, TextureAssetInfo, Shader, ShaderDesc, ShaderStage,
    Pipeline, PipelineDesc, ComputePipelineDesc, CullMode, BlendMode, PrimitiveTopology, VertexLayout,
    BindingGroup, BindingGroupLayout, BindingGroupLayoutDesc, BindingWrite, BindingResource,
    Domain, InputAttachmentInfo, RenderPassInfo, FenceFlag, FrameSynchronizer,
};

/// Address of the object behind an `Arc`, used as a stable identity
pub fn address<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub id: usize,
    pub desc: BufferDesc,
    pub data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    /// Contents as f32 values (uniform buffers)
    pub fn floats(&self) -> Vec<f32> {
        let data = self.data.lock().map(|data| data.clone()).unwrap_or_default();
        data.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.desc.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut contents = self.data.lock()
            .map_err(|_| Error::BackendError("MockBuffer lock poisoned".to_string()))?;
        let end = offset as usize + data.len();
        if end > contents.len() {
            return Err(Error::InvalidResource(format!(
                "Write of {} bytes at offset {} exceeds buffer size {}", data.len(), offset, contents.len()
            )));
        }
        contents[offset as usize..end].copy_from_slice(data);
        Ok(())
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureAssetInfo,
}

impl MockTexture {
    pub fn new(info: TextureAssetInfo) -> Self {
        Self { info }
    }
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureAssetInfo {
        &self.info
    }
}

// ============================================================================
// Mock Shader / Layout / Group / Pipeline
// ============================================================================

#[derive(Debug)]
pub struct MockShader {
    pub stage: ShaderStage,
    pub source: String,
    pub debug_name: String,
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

#[derive(Debug)]
pub struct MockBindingGroupLayout {
    pub desc: BindingGroupLayoutDesc,
}

impl BindingGroupLayout for MockBindingGroupLayout {
    fn desc(&self) -> &BindingGroupLayoutDesc {
        &self.desc
    }
}

#[derive(Debug)]
pub struct MockBindingGroup {
    pub id: usize,
    pub set_index: u32,
    pub layout: BindingGroupLayoutDesc,
}

impl BindingGroup for MockBindingGroup {
    fn set_index(&self) -> u32 {
        self.set_index
    }
}

#[derive(Debug)]
pub struct MockPipeline {
    pub id: usize,
}

impl Pipeline for MockPipeline {}

/// Summary of a created pipeline
#[derive(Debug, Clone)]
pub struct RecordedPipeline {
    pub compute: bool,
    /// Shader sources: [vertex, fragment] or [compute]
    pub shader_sources: Vec<String>,
    pub topology: Option<PrimitiveTopology>,
    pub cull_mode: Option<CullMode>,
    pub blend_mode: Option<BlendMode>,
    pub vertex_layout: Option<VertexLayout>,
    pub set_count: usize,
    pub subpass: u32,
}

/// What a recorded write bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedResource {
    UniformBuffer(usize),
    StorageBuffer(usize),
    Texture(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub group: usize,
    pub set_index: u32,
    pub binding: u32,
    pub resource: RecordedResource,
}

// ============================================================================
// Mock Graphics Device
// ============================================================================

pub struct MockGraphicsDevice {
    pub frames_in_flight: usize,
    pub frame_counter: u64,
    pub buffers: Vec<Arc<MockBuffer>>,
    pub shaders: Vec<Arc<MockShader>>,
    pub layouts: Vec<BindingGroupLayoutDesc>,
    pub binding_groups: Vec<Arc<MockBindingGroup>>,
    pub pipelines: Vec<RecordedPipeline>,
    pub writes: Vec<RecordedWrite>,
    pub write_batches: usize,
    /// Shader sources containing this text fail to compile
    pub shader_fail_marker: Option<String>,
    /// Number of upcoming set layout creations that fail
    pub layout_failures: usize,
    buffer_ids: FxHashMap<usize, usize>,
    group_ids: FxHashMap<usize, usize>,
    shader_ids: FxHashMap<usize, usize>,
}

impl MockGraphicsDevice {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight,
            frame_counter: 0,
            buffers: Vec::new(),
            shaders: Vec::new(),
            layouts: Vec::new(),
            binding_groups: Vec::new(),
            pipelines: Vec::new(),
            writes: Vec::new(),
            write_batches: 0,
            shader_fail_marker: None,
            layout_failures: 0,
            buffer_ids: FxHashMap::default(),
            group_ids: FxHashMap::default(),
            shader_ids: FxHashMap::default(),
        }
    }

    /// Wrap in the shared form expected by the material system
    pub fn shared(frames_in_flight: usize) -> (Arc<Mutex<MockGraphicsDevice>>, Arc<Mutex<dyn GraphicsDevice>>) {
        let mock = Arc::new(Mutex::new(Self::new(frames_in_flight)));
        let device: Arc<Mutex<dyn GraphicsDevice>> = mock.clone();
        (mock, device)
    }

    pub fn advance_frame(&mut self) {
        self.frame_counter += 1;
    }

    /// Id of a buffer created by this device
    pub fn buffer_id(&self, buffer: &Arc<dyn Buffer>) -> Option<usize> {
        self.buffer_ids.get(&address(buffer)).copied()
    }

    /// Id of a binding group created by this device
    pub fn group_id(&self, group: &Arc<dyn BindingGroup>) -> Option<usize> {
        self.group_ids.get(&address(group)).copied()
    }

    pub fn buffer(&self, id: usize) -> Option<&Arc<MockBuffer>> {
        self.buffers.get(id)
    }

    /// Writes received for one binding of one group
    pub fn writes_for(&self, group: usize, binding: u32) -> Vec<&RecordedWrite> {
        self.writes.iter().filter(|w| w.group == group && w.binding == binding).collect()
    }

    fn shader_source(&self, shader: &Arc<dyn Shader>) -> String {
        self.shader_ids.get(&address(shader))
            .and_then(|id| self.shaders.get(*id))
            .map(|shader| shader.source.clone())
            .unwrap_or_default()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn current_frame_index(&self) -> usize {
        (self.frame_counter % self.frames_in_flight as u64) as usize
    }

    fn last_frame_index(&self) -> usize {
        (self.current_frame_index() + self.frames_in_flight - 1) % self.frames_in_flight
    }

    fn create_buffer(&mut self, desc: BufferDesc, data: &[u8]) -> Result<Arc<dyn Buffer>> {
        let mut contents = vec![0u8; desc.size as usize];
        let len = data.len().min(contents.len());
        contents[..len].copy_from_slice(&data[..len]);

        let buffer = Arc::new(MockBuffer {
            id: self.buffers.len(),
            desc,
            data: Mutex::new(contents),
        });
        self.buffer_ids.insert(address(&buffer), buffer.id);
        self.buffers.push(buffer.clone());
        Ok(buffer)
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        if let Some(marker) = &self.shader_fail_marker {
            if desc.source.contains(marker.as_str()) {
                return Err(Error::ShaderCompilation(format!("{}: error near '{}'", desc.debug_name, marker)));
            }
        }
        let shader = Arc::new(MockShader {
            stage: desc.stage,
            source: desc.source.to_string(),
            debug_name: desc.debug_name.to_string(),
        });
        self.shader_ids.insert(address(&shader), self.shaders.len());
        self.shaders.push(shader.clone());
        Ok(shader)
    }

    fn create_binding_group_layout(&mut self, desc: BindingGroupLayoutDesc) -> Result<Arc<dyn BindingGroupLayout>> {
        if self.layout_failures > 0 {
            self.layout_failures -= 1;
            return Err(Error::OutOfMemory);
        }
        self.layouts.push(desc.clone());
        Ok(Arc::new(MockBindingGroupLayout { desc }))
    }

    fn create_binding_group(
        &mut self,
        layout: &Arc<dyn BindingGroupLayout>,
        set_index: u32,
    ) -> Result<Arc<dyn BindingGroup>> {
        let group = Arc::new(MockBindingGroup {
            id: self.binding_groups.len(),
            set_index,
            layout: layout.desc().clone(),
        });
        self.group_ids.insert(address(&group), group.id);
        self.binding_groups.push(group.clone());
        Ok(group)
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        let record = RecordedPipeline {
            compute: false,
            shader_sources: vec![self.shader_source(&desc.vertex_shader), self.shader_source(&desc.fragment_shader)],
            topology: Some(desc.topology),
            cull_mode: Some(desc.cull_mode),
            blend_mode: Some(desc.blend_mode),
            vertex_layout: Some(desc.vertex_layout.clone()),
            set_count: desc.binding_group_layouts.len(),
            subpass: desc.subpass,
        };
        self.pipelines.push(record);
        Ok(Arc::new(MockPipeline { id: self.pipelines.len() - 1 }))
    }

    fn create_compute_pipeline(&mut self, desc: ComputePipelineDesc) -> Result<Arc<dyn Pipeline>> {
        let record = RecordedPipeline {
            compute: true,
            shader_sources: vec![self.shader_source(&desc.shader)],
            topology: None,
            cull_mode: None,
            blend_mode: None,
            vertex_layout: None,
            set_count: desc.binding_group_layouts.len(),
            subpass: 0,
        };
        self.pipelines.push(record);
        Ok(Arc::new(MockPipeline { id: self.pipelines.len() - 1 }))
    }

    fn write_binding_groups(&mut self, writes: &[BindingWrite]) -> Result<()> {
        self.write_batches += 1;
        for write in writes {
            let resource = match &write.resource {
                BindingResource::UniformBuffer(buffer) => {
                    RecordedResource::UniformBuffer(self.buffer_id(buffer).unwrap_or(usize::MAX))
                }
                BindingResource::StorageBuffer(buffer) => {
                    RecordedResource::StorageBuffer(self.buffer_id(buffer).unwrap_or(usize::MAX))
                }
                BindingResource::SampledTexture(texture) => RecordedResource::Texture(texture.info().path.clone()),
            };
            self.writes.push(RecordedWrite {
                group: self.group_id(&write.group).unwrap_or(usize::MAX),
                set_index: write.group.set_index(),
                binding: write.binding,
                resource,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Mock Render Pass
// ============================================================================

/// Forward renders in subpass 0, every other domain in subpass 1
#[derive(Debug, Default)]
pub struct MockRenderPass {
    pub input_attachments: Vec<InputAttachmentInfo>,
}

impl RenderPassInfo for MockRenderPass {
    fn subpass_index(&self, domain: Domain) -> u32 {
        if domain == Domain::Forward { 0 } else { 1 }
    }

    fn sample_count(&self, _domain: Domain) -> u32 {
        1
    }

    fn input_attachments(&self) -> &[InputAttachmentInfo] {
        &self.input_attachments
    }
}

// ============================================================================
// Mock Synchronizer
// ============================================================================

#[derive(Debug, Default)]
pub struct MockSynchronizer {
    pub waits: Vec<FenceFlag>,
}

impl FrameSynchronizer for MockSynchronizer {
    fn wait(&mut self, fence: FenceFlag) -> Result<()> {
        self.waits.push(fence);
        Ok(())
    }
}

// ============================================================================
// Mock Texture Pool
// ============================================================================

/// Texture pool creating a new `MockTexture` on every request
#[derive(Debug, Default)]
pub struct MockTexturePool {
    pub requests: Vec<TextureAssetInfo>,
    /// Paths that fail to load
    pub missing_paths: Vec<String>,
}

impl TexturePool for MockTexturePool {
    fn texture(&mut self, info: &TextureAssetInfo) -> Result<Arc<dyn Texture>> {
        self.requests.push(info.clone());
        if self.missing_paths.contains(&info.path) {
            return Err(Error::AssetError(format!("cannot load {}", info.path)));
        }
        Ok(Arc::new(MockTexture::new(info.clone())))
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
