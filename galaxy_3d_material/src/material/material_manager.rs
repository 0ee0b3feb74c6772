/// MaterialManager - registry and per-frame orchestrator of materials
///
/// The manager owns every `MaterialLayout` (one per material name) and
/// every `MaterialResource` (one per instance name) in slot maps, plus the
/// global set shared by all materials and the per-object sets of meshes.
/// Edits only mark keys dirty; `update()` applies them once per frame and
/// flushes every binding write in a single batch.
///
/// # Frame model
///
/// The compute pass of a frame slot runs one frame behind graphics, so
/// compute lookups use the device's last frame index while graphics
/// lookups use the current one. Before touching resources a dispatch may
/// still read, `update()` waits on the `ComputeInFlight` fence.
///
/// # Sharing
///
/// The manager is shared as `Arc<Mutex<MaterialManager>>`. Asset monitor
/// callbacks hold a `Weak` to it and lock it before touching the
/// registry; the manager locks the monitor only after itself.

use std::sync::{Arc, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use crate::asset::asset_monitor::{
    AssetMonitor, AssetType, ModifiedCallback, TagInfos, TAG_MATERIAL_INSTANCE_NAME, TAG_MATERIAL_NAME,
};
use crate::asset::asset_reader::{AssetReader, BUILTIN_PREFIX};
use crate::asset::material_asset::MaterialAsset;
use crate::asset::material_instance_asset::MaterialInstanceAsset;
use crate::asset::texture_pool::TexturePool;
use crate::config::MaterialConfig;
use crate::error::{Error, Result};
use crate::graphics_device::{
    lock_device, BindingGroup, BindingGroupLayout, BindingGroupLayoutDesc, BindingGroupWriter, BindingType,
    Buffer, BufferDesc, BufferUsage, FenceFlag, FrameSynchronizer, GraphicsDevice, RenderPassInfo,
    ShaderStageFlags, Texture,
};
use crate::material::material::Material;
use crate::material::material_instance::MaterialInstance;
use crate::material::material_layout::{MaterialLayout, MaterialLayoutKey};
use crate::material::material_resource::{MaterialResource, MaterialResourceKey, ResourceUpdateContext};
use crate::material::stage::{GlobalSetBinding, GLOBAL_SET_INDEX, MESH_UNIFORM_BINDING, PER_OBJECT_SET_INDEX};
use crate::material::uniforms::{GlobalUniform, MeshUniform};
use crate::{engine_error, engine_info, engine_warn};

const LOG_SOURCE: &str = "galaxy3d::MaterialManager";

// ============================================================================
// DESCRIPTOR SET REFERENCES
// ============================================================================

/// Binding groups to bind for one draw or dispatch, in set-index order
///
/// `[global, per_object, material stage sets...]`
#[derive(Debug, Clone)]
pub struct DescriptorSetReferences {
    groups: Vec<Arc<dyn BindingGroup>>,
}

impl DescriptorSetReferences {
    pub fn new(
        global: Arc<dyn BindingGroup>,
        per_object: Arc<dyn BindingGroup>,
        material_groups: Vec<Arc<dyn BindingGroup>>,
    ) -> Self {
        let mut groups = Vec::with_capacity(2 + material_groups.len());
        groups.push(global);
        groups.push(per_object);
        groups.extend(material_groups);
        Self { groups }
    }

    pub fn groups(&self) -> &[Arc<dyn BindingGroup>] {
        &self.groups
    }

    pub fn group(&self, set_index: u32) -> Option<&Arc<dyn BindingGroup>> {
        self.groups.get(set_index as usize)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn replace(&mut self, set_index: u32, group: Arc<dyn BindingGroup>) {
        if let Some(slot) = self.groups.get_mut(set_index as usize) {
            *slot = group;
        }
    }
}

// ============================================================================
// SET CONTEXTS
// ============================================================================

/// Global set (set 0): scene uniform, global textures, input attachments
struct GlobalSetContext {
    uniform: GlobalUniform,
    /// Uniform buffer per frame slot, created on first update
    buffers: Vec<Option<Arc<dyn Buffer>>>,
    groups: Vec<Arc<dyn BindingGroup>>,
    /// Mirror sets read by compute dispatches
    compute_groups: Vec<Arc<dyn BindingGroup>>,
    /// Held so the pool keeps them alive
    _textures: Vec<Arc<dyn Texture>>,
}

impl GlobalSetContext {
    fn new(
        device: &mut dyn GraphicsDevice,
        layout: &Arc<dyn BindingGroupLayout>,
        texture_pool: &mut dyn TexturePool,
        config: &MaterialConfig,
        writer: &mut BindingGroupWriter,
    ) -> Result<Self> {
        let frames = config.max_frames_in_flight;
        let groups = (0..frames)
            .map(|_| device.create_binding_group(layout, GLOBAL_SET_INDEX))
            .collect::<Result<Vec<_>>>()?;
        let compute_groups = (0..frames)
            .map(|_| device.create_binding_group(layout, GLOBAL_SET_INDEX))
            .collect::<Result<Vec<_>>>()?;

        let mut textures = Vec::new();
        for binding in GlobalSetBinding::TEXTURES {
            let info = match binding {
                GlobalSetBinding::AmbientTexture => &config.ambient_texture,
                GlobalSetBinding::ShadowMapTexture => &config.shadow_map_texture,
                GlobalSetBinding::GlobalUniform => continue,
            };
            let texture = texture_pool.texture(info)?;
            for group in &groups {
                writer.register_texture(group, binding.binding(), &texture);
            }
            textures.push(texture);
        }

        Ok(Self {
            uniform: GlobalUniform::default(),
            buffers: vec![None; frames],
            groups,
            compute_groups,
            _textures: textures,
        })
    }
}

/// Per-object set (set 1) of one mesh drawn with a material instance
struct PerObjectSetContext {
    mesh_uniform: MeshUniform,
    buffers: Vec<Option<Arc<dyn Buffer>>>,
    groups: Vec<Option<Arc<dyn BindingGroup>>>,
    set_references: Vec<Option<DescriptorSetReferences>>,
    /// Material sets changed since this frame slot's references were built
    material_changed: Vec<bool>,
    /// Submitted since the last update; inactive contexts are dropped
    active: bool,
}

impl PerObjectSetContext {
    fn new(mesh_uniform: MeshUniform, frames_in_flight: usize) -> Self {
        Self {
            mesh_uniform,
            buffers: vec![None; frames_in_flight],
            groups: vec![None; frames_in_flight],
            set_references: vec![None; frames_in_flight],
            material_changed: vec![true; frames_in_flight],
            active: true,
        }
    }
}

// ============================================================================
// MATERIAL MANAGER
// ============================================================================

/// Collaborators and settings of a MaterialManager
pub struct MaterialManagerDesc {
    pub device: Arc<Mutex<dyn GraphicsDevice>>,
    pub render_pass: Arc<dyn RenderPassInfo>,
    pub texture_pool: Box<dyn TexturePool>,
    pub asset_reader: Arc<dyn AssetReader>,
    /// Hot reload is disabled without a monitor
    pub asset_monitor: Option<Arc<Mutex<dyn AssetMonitor>>>,
    pub config: MaterialConfig,
}

pub struct MaterialManager {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    render_pass: Arc<dyn RenderPassInfo>,
    texture_pool: Box<dyn TexturePool>,
    asset_reader: Arc<dyn AssetReader>,
    asset_monitor: Option<Arc<Mutex<dyn AssetMonitor>>>,
    config: MaterialConfig,

    writer: BindingGroupWriter,
    global_layout: Arc<dyn BindingGroupLayout>,
    per_object_layout: Arc<dyn BindingGroupLayout>,
    global_context: GlobalSetContext,

    layouts: SlotMap<MaterialLayoutKey, MaterialLayout>,
    layout_names: FxHashMap<String, MaterialLayoutKey>,
    resources: SlotMap<MaterialResourceKey, MaterialResource>,
    resource_names: FxHashMap<String, MaterialResourceKey>,
    object_contexts: FxHashMap<MaterialResourceKey, Vec<PerObjectSetContext>>,

    dirty_layouts: FxHashSet<MaterialLayoutKey>,
    dirty_resources: FxHashSet<MaterialResourceKey>,
    dirty_contexts: FxHashSet<MaterialResourceKey>,

    /// Frame slots read from the device by the last `update`/`update_compute`
    frame_index: usize,
    compute_frame_index: usize,
}

impl MaterialManager {
    /// Create the manager, its shared set layouts and the error material
    ///
    /// # Errors
    ///
    /// Fails if the config is invalid, the device rejects a set layout or
    /// binding group, or a global texture cannot be loaded.
    pub fn new(desc: MaterialManagerDesc) -> Result<Self> {
        let MaterialManagerDesc { device, render_pass, mut texture_pool, asset_reader, asset_monitor, config } = desc;
        if config.max_frames_in_flight == 0 {
            return Err(Error::InitializationFailed("maxFramesInFlight must be at least 1".to_string()));
        }

        let mut writer = BindingGroupWriter::new();
        let (global_layout, per_object_layout, global_context, frame_index, compute_frame_index) = {
            let mut guard = lock_device(&device)?;
            let device_ref: &mut dyn GraphicsDevice = &mut *guard;
            let frame_index = device_ref.current_frame_index();
            let compute_frame_index = device_ref.last_frame_index();

            let global_layout = device_ref.create_binding_group_layout(Self::global_layout_desc(render_pass.as_ref()))?;
            let mut per_object_desc = BindingGroupLayoutDesc::default();
            per_object_desc.append(BindingType::UniformBuffer, ShaderStageFlags::VERTEX_FRAGMENT);
            let per_object_layout = device_ref.create_binding_group_layout(per_object_desc)?;

            let global_context = GlobalSetContext::new(
                device_ref,
                &global_layout,
                texture_pool.as_mut(),
                &config,
                &mut writer,
            )?;
            (global_layout, per_object_layout, global_context, frame_index, compute_frame_index)
        };

        let mut manager = Self {
            device,
            render_pass,
            texture_pool,
            asset_reader,
            asset_monitor,
            config,
            writer,
            global_layout,
            per_object_layout,
            global_context,
            layouts: SlotMap::with_key(),
            layout_names: FxHashMap::default(),
            resources: SlotMap::with_key(),
            resource_names: FxHashMap::default(),
            object_contexts: FxHashMap::default(),
            dirty_layouts: FxHashSet::default(),
            dirty_resources: FxHashSet::default(),
            dirty_contexts: FxHashSet::default(),
            frame_index,
            compute_frame_index,
        };

        let error_name = manager.config.error_material_name.clone();
        manager.create_material(&error_name, &Material::error_material());
        manager.create_material_instance(&error_name, &error_name);

        engine_info!(LOG_SOURCE, "MaterialManager created ({} frames in flight)", manager.frames_in_flight());
        Ok(manager)
    }

    /// Global set layout: uniform, global textures, then one sampler per input attachment
    fn global_layout_desc(render_pass: &dyn RenderPassInfo) -> BindingGroupLayoutDesc {
        let mut desc = BindingGroupLayoutDesc::default();
        desc.append(
            BindingType::UniformBuffer,
            ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT | ShaderStageFlags::COMPUTE,
        );
        for _ in GlobalSetBinding::TEXTURES {
            desc.append(BindingType::CombinedImageSampler, ShaderStageFlags::FRAGMENT);
        }
        for _ in render_pass.input_attachments() {
            desc.append(BindingType::CombinedImageSampler, ShaderStageFlags::FRAGMENT);
        }
        desc
    }

    pub fn config(&self) -> &MaterialConfig {
        &self.config
    }

    pub fn frames_in_flight(&self) -> usize {
        self.config.max_frames_in_flight
    }

    pub fn error_material_name(&self) -> &str {
        &self.config.error_material_name
    }

    pub fn global_uniform(&self) -> &GlobalUniform {
        &self.global_context.uniform
    }

    /// Scene uniform uploaded to the global set on every `update`
    pub fn global_uniform_mut(&mut self) -> &mut GlobalUniform {
        &mut self.global_context.uniform
    }

    /// True when an `update` has layouts, resources or objects to apply
    pub fn has_pending_updates(&self) -> bool {
        !self.dirty_layouts.is_empty() || !self.dirty_resources.is_empty() || !self.dirty_contexts.is_empty()
    }

    // ===== CREATION / REMOVAL =====

    fn layout_key_or_insert(&mut self, name: &str) -> MaterialLayoutKey {
        if let Some(&key) = self.layout_names.get(name) {
            if self.layouts.contains_key(key) {
                return key;
            }
        }
        let key = self.layouts.insert(MaterialLayout::new(Material::empty(), self.config.max_frames_in_flight));
        self.layout_names.insert(name.to_string(), key);
        key
    }

    /// Register `material` under `name`, replacing the value of an existing material
    pub fn create_material(&mut self, name: &str, material: &Material) -> MaterialLayoutKey {
        let key = self.layout_key_or_insert(name);
        if let Some(layout) = self.layouts.get_mut(key) {
            layout.set_material(material.clone());
        }
        self.dirty_layouts.insert(key);
        key
    }

    /// Register an instance of `parent_name` under `name`
    ///
    /// A missing parent is created empty. An existing instance of the same
    /// parent is kept as is; an instance of another parent is replaced.
    pub fn create_material_instance(&mut self, name: &str, parent_name: &str) -> MaterialResourceKey {
        let layout_key = match self.layout_names.get(parent_name) {
            Some(&key) if self.layouts.contains_key(key) => key,
            _ => {
                engine_warn!(
                    LOG_SOURCE,
                    "Parent material '{}' of instance '{}' not found, created an empty one",
                    parent_name, name
                );
                let key = self.layout_key_or_insert(parent_name);
                self.dirty_layouts.insert(key);
                key
            }
        };

        let existing = self.resource_names.get(name).copied().filter(|key| self.resources.contains_key(*key));
        let key = match existing {
            Some(key) if self.resources.get(key).is_some_and(|resource| resource.layout_key() == layout_key) => key,
            _ => {
                let instance = match self.layouts.get(layout_key) {
                    Some(layout) => MaterialInstance::new(layout.material(), layout.handle(layout_key)),
                    None => MaterialInstance::detached(&Material::empty()),
                };
                let resource = MaterialResource::new(layout_key, instance, self.config.max_frames_in_flight);
                match existing.and_then(|key| self.resources.get_mut(key).map(|slot| (key, slot))) {
                    Some((key, slot)) => {
                        Self::discard_resource_writes(&mut self.writer, slot);
                        *slot = resource;
                        key
                    }
                    None => {
                        let key = self.resources.insert(resource);
                        self.resource_names.insert(name.to_string(), key);
                        key
                    }
                }
            }
        };
        self.dirty_resources.insert(key);
        key
    }

    fn discard_resource_writes(writer: &mut BindingGroupWriter, resource: &MaterialResource) {
        for frame_index in 0..resource.frames_in_flight() {
            for group in resource.binding_groups(frame_index) {
                writer.discard_group(&group);
            }
        }
    }

    fn drop_resource(&mut self, key: MaterialResourceKey) {
        if let Some(resource) = self.resources.remove(key) {
            Self::discard_resource_writes(&mut self.writer, &resource);
        }
        self.dirty_resources.remove(&key);
        self.object_contexts.remove(&key);
        self.dirty_contexts.remove(&key);
    }

    /// Remove a material and every instance derived from it
    pub fn remove_material(&mut self, name: &str) -> bool {
        let Some(key) = self.layout_names.remove(name) else {
            return false;
        };
        self.layouts.remove(key);
        self.dirty_layouts.remove(&key);

        let derived: Vec<MaterialResourceKey> = self.resources
            .iter()
            .filter(|(_, resource)| resource.layout_key() == key)
            .map(|(resource_key, _)| resource_key)
            .collect();
        for resource_key in derived {
            self.drop_resource(resource_key);
        }
        self.resource_names.retain(|_, resource_key| self.resources.contains_key(*resource_key));
        engine_info!(LOG_SOURCE, "Removed material '{}'", name);
        true
    }

    /// Remove an instance and its per-object sets
    pub fn remove_material_instance(&mut self, name: &str) -> bool {
        let Some(key) = self.resource_names.remove(name) else {
            return false;
        };
        self.drop_resource(key);
        true
    }

    // ===== LOOKUP =====

    pub fn material_layout_key(&self, name: &str) -> Option<MaterialLayoutKey> {
        self.layout_names.get(name).copied()
    }

    pub fn material_resource_key(&self, name: &str) -> Option<MaterialResourceKey> {
        self.resource_names.get(name).copied()
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.material_layout(name).map(MaterialLayout::material)
    }

    /// Editable material; call `submit_material` to apply the edit
    pub fn material_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.material_layout_mut(name).map(MaterialLayout::material_mut)
    }

    pub fn material_instance(&self, name: &str) -> Option<&MaterialInstance> {
        let key = self.material_resource_key(name)?;
        self.resources.get(key).map(MaterialResource::instance)
    }

    /// Editable instance; call `submit_material_instance` to apply the edit
    pub fn material_instance_mut(&mut self, name: &str) -> Option<&mut MaterialInstance> {
        let key = self.material_resource_key(name)?;
        self.resources.get_mut(key).map(MaterialResource::instance_mut)
    }

    pub fn material_layout(&self, name: &str) -> Option<&MaterialLayout> {
        let key = self.material_layout_key(name)?;
        self.layouts.get(key)
    }

    pub fn material_layout_mut(&mut self, name: &str) -> Option<&mut MaterialLayout> {
        let key = self.material_layout_key(name)?;
        self.layouts.get_mut(key)
    }

    pub fn material_resource(&self, name: &str) -> Option<&MaterialResource> {
        let resource = self.material_resource_key(name).and_then(|key| self.resources.get(key));
        if resource.is_none() {
            engine_warn!(LOG_SOURCE, "Material instance '{}' does not exist", name);
        }
        resource
    }

    pub fn error_material_resource(&self) -> Option<&MaterialResource> {
        self.material_resource(&self.config.error_material_name)
    }

    // ===== SUBMISSION =====

    /// Schedule a material for re-application on the next update
    pub fn submit_material(&mut self, name: &str) -> bool {
        match self.material_layout_key(name) {
            Some(key) => {
                self.dirty_layouts.insert(key);
                true
            }
            None => false,
        }
    }

    /// Schedule an instance for re-upload on the next update
    pub fn submit_material_instance(&mut self, name: &str) -> bool {
        match self.material_resource_key(name) {
            Some(key) => {
                self.dirty_resources.insert(key);
                true
            }
            None => false,
        }
    }

    /// Record the mesh uniform of one object drawn with `instance_name`
    ///
    /// An unknown instance is created from the material of the same name.
    /// Objects not submitted before an update lose their per-object sets.
    pub fn submit_mesh_uniform(&mut self, instance_name: &str, mesh_uniform: &MeshUniform) -> bool {
        let key = match self.material_resource_key(instance_name) {
            Some(key) => key,
            None => {
                if self.material_layout_key(instance_name).is_none() {
                    engine_error!(LOG_SOURCE, "Material not found: '{}'", instance_name);
                    return false;
                }
                engine_info!(
                    LOG_SOURCE,
                    "Material instance '{}' not found, created from the material of the same name",
                    instance_name
                );
                self.create_material_instance(instance_name, instance_name)
            }
        };

        let frames = self.config.max_frames_in_flight;
        let contexts = self.object_contexts.entry(key).or_default();
        match contexts.iter_mut().find(|context| context.mesh_uniform.object_id == mesh_uniform.object_id) {
            Some(context) => {
                context.mesh_uniform = *mesh_uniform;
                context.active = true;
            }
            None => contexts.push(PerObjectSetContext::new(*mesh_uniform, frames)),
        }
        self.dirty_contexts.insert(key);
        true
    }

    // ===== FRAME UPDATE =====

    fn check_frame_index(&self, frame_index: usize) -> Result<()> {
        if frame_index >= self.config.max_frames_in_flight {
            return Err(Error::InvalidState(format!(
                "Frame index {} out of range for {} frames in flight",
                frame_index, self.config.max_frames_in_flight
            )));
        }
        Ok(())
    }

    /// Apply every pending change for the device's current frame slot
    ///
    /// `attachment_images` are bound to the global set's input-attachment
    /// bindings, in the render pass's attachment order.
    ///
    /// A layout, instance or object that fails is logged and queued again
    /// for the next update; the others are still applied and the binding
    /// writes are always flushed.
    pub fn update(&mut self, attachment_images: &[Arc<dyn Texture>], synchronizer: &mut dyn FrameSynchronizer) -> Result<()> {
        if !self.dirty_layouts.is_empty() || !self.dirty_resources.is_empty() {
            synchronizer.wait(FenceFlag::ComputeInFlight)?;
        }

        let device_arc = self.device.clone();
        let mut device = lock_device(&device_arc)?;
        let frame_index = device.current_frame_index();
        self.check_frame_index(frame_index)?;
        self.frame_index = frame_index;
        self.compute_frame_index = device.last_frame_index();

        if let Err(err) = self.apply_global_set(&mut *device, frame_index, attachment_images) {
            engine_error!(LOG_SOURCE, "Failed to apply the global set: {}", err);
        }

        let mut failed_layouts = Vec::new();
        for key in std::mem::take(&mut self.dirty_layouts) {
            if let Err(err) = self.apply_material_layout(&mut *device, key) {
                engine_error!(LOG_SOURCE, "Failed to apply material layout, retrying next update: {}", err);
                failed_layouts.push(key);
            }
        }
        for key in std::mem::take(&mut self.dirty_resources) {
            self.apply_material_resource(&mut *device, key);
        }
        let mut failed_contexts = Vec::new();
        for key in std::mem::take(&mut self.dirty_contexts) {
            if let Err(err) = self.apply_object_contexts(&mut *device, key, frame_index) {
                engine_error!(LOG_SOURCE, "Failed to apply per-object sets, retrying next update: {}", err);
                failed_contexts.push(key);
            }
        }
        self.dirty_layouts.extend(failed_layouts);
        self.dirty_contexts.extend(failed_contexts);

        self.writer.write(&mut *device)
    }

    /// Refresh the compute mirror of the global set for the last frame slot
    pub fn update_compute(&mut self) -> Result<()> {
        let device_arc = self.device.clone();
        let mut device = lock_device(&device_arc)?;
        let frame_index = device.last_frame_index();
        self.check_frame_index(frame_index)?;
        self.compute_frame_index = frame_index;

        let context = &self.global_context;
        let Some(buffer) = context.buffers[frame_index].as_ref() else {
            return Ok(());
        };
        self.writer.register_uniform_buffer(
            &context.compute_groups[frame_index],
            GlobalSetBinding::GlobalUniform.binding(),
            buffer,
        );
        self.writer.write(&mut *device)
    }

    fn apply_global_set(
        &mut self,
        device: &mut dyn GraphicsDevice,
        frame_index: usize,
        attachment_images: &[Arc<dyn Texture>],
    ) -> Result<()> {
        let context = &mut self.global_context;
        let bytes = context.uniform.as_bytes();
        let buffer = match context.buffers[frame_index].clone() {
            Some(buffer) => {
                buffer.update(0, bytes)?;
                buffer
            }
            None => {
                let buffer = device.create_buffer(
                    BufferDesc { size: bytes.len() as u64, usage: BufferUsage::Uniform },
                    bytes,
                )?;
                context.buffers[frame_index] = Some(buffer.clone());
                buffer
            }
        };

        let group = &context.groups[frame_index];
        self.writer.register_uniform_buffer(group, GlobalSetBinding::GlobalUniform.binding(), &buffer);
        for (index, attachment) in self.render_pass.input_attachments().iter().enumerate() {
            match attachment_images.get(index) {
                Some(image) => self.writer.register_texture(group, GlobalSetBinding::COUNT + index as u32, image),
                None => engine_warn!(LOG_SOURCE, "No image provided for input attachment '{}'", attachment.name),
            }
        }
        Ok(())
    }

    /// Build pipelines; the compute pipeline only with a compute task
    fn rebuild_pipelines(
        layout: &mut MaterialLayout,
        device: &mut dyn GraphicsDevice,
        render_pass: &dyn RenderPassInfo,
        reader: &dyn AssetReader,
    ) -> Result<()> {
        layout.update_pipeline(device, render_pass, reader)?;
        if layout.material().has_compute_task() {
            layout.update_compute_pipeline(device, reader)?;
        }
        Ok(())
    }

    /// Rebuild pipelines, substituting the error shaders on failure
    fn rebuild_pipelines_or_error_shaders(
        layout: &mut MaterialLayout,
        device: &mut dyn GraphicsDevice,
        render_pass: &dyn RenderPassInfo,
        reader: &dyn AssetReader,
    ) {
        let Err(err) = Self::rebuild_pipelines(layout, device, render_pass, reader) else {
            return;
        };
        engine_error!(LOG_SOURCE, "Failed to apply material, using error shaders: {}", err);
        let retry = layout
            .apply_error_shaders(device, render_pass, reader)
            .and_then(|()| layout.update_pipeline(device, render_pass, reader));
        if let Err(err) = retry {
            engine_error!(LOG_SOURCE, "Error shaders failed as well: {}", err);
        }
    }

    fn apply_material_layout(&mut self, device: &mut dyn GraphicsDevice, key: MaterialLayoutKey) -> Result<()> {
        let Some(layout) = self.layouts.get_mut(key) else {
            return Ok(());
        };
        layout.update_descriptor_set_layouts(device, &self.global_layout, &self.per_object_layout)?;
        Self::rebuild_pipelines_or_error_shaders(layout, device, self.render_pass.as_ref(), self.asset_reader.as_ref());

        // Derived instances need groups matching the new set layouts
        let Some(layout) = self.layouts.get(key) else {
            return Ok(());
        };
        let mut result = Ok(());
        for (resource_key, resource) in self.resources.iter_mut() {
            if resource.layout_key() != key {
                continue;
            }
            match resource.reload_material_layout(layout, device, &mut self.writer) {
                Ok(()) => {
                    self.dirty_resources.insert(resource_key);
                }
                Err(err) => result = result.and(Err(err)),
            }
        }
        result
    }

    fn apply_material_resource(&mut self, device: &mut dyn GraphicsDevice, key: MaterialResourceKey) {
        let Some(resource) = self.resources.get_mut(key) else {
            return;
        };
        let Some(layout) = self.layouts.get(resource.layout_key()) else {
            engine_warn!(LOG_SOURCE, "Material instance has no material layout, skipped");
            return;
        };

        if !resource.has_binding_groups() {
            if let Err(err) = resource.reload_material_layout(layout, device, &mut self.writer) {
                engine_error!(LOG_SOURCE, "Failed to allocate material instance sets: {}", err);
                return;
            }
        }

        let mut ctx = ResourceUpdateContext {
            device,
            writer: &mut self.writer,
            texture_pool: self.texture_pool.as_mut(),
            default_texture: &self.config.default_texture,
        };
        if let Err(err) = resource.update(layout, &mut ctx) {
            engine_error!(LOG_SOURCE, "Failed to apply material instance: {}", err);
        }

        if let Some(contexts) = self.object_contexts.get_mut(&key) {
            for context in contexts {
                context.material_changed.fill(true);
            }
        }
    }

    fn apply_object_contexts(
        &mut self,
        device: &mut dyn GraphicsDevice,
        key: MaterialResourceKey,
        frame_index: usize,
    ) -> Result<()> {
        let Some(contexts) = self.object_contexts.get_mut(&key) else {
            return Ok(());
        };
        contexts.retain(|context| context.active);

        let material_groups = self.resources.get(key).map(|resource| resource.binding_groups(frame_index)).unwrap_or_default();
        let global_group = &self.global_context.groups[frame_index];

        let mut result = Ok(());
        for context in contexts.iter_mut() {
            let applied = Self::apply_object_context(
                context,
                device,
                &mut self.writer,
                &self.per_object_layout,
                global_group,
                &material_groups,
                frame_index,
            );
            match applied {
                Ok(()) => context.active = false,
                Err(err) => result = result.and(Err(err)),
            }
        }
        result
    }

    /// Upload one mesh uniform and refresh its set references for `frame_index`
    fn apply_object_context(
        context: &mut PerObjectSetContext,
        device: &mut dyn GraphicsDevice,
        writer: &mut BindingGroupWriter,
        per_object_layout: &Arc<dyn BindingGroupLayout>,
        global_group: &Arc<dyn BindingGroup>,
        material_groups: &[Arc<dyn BindingGroup>],
        frame_index: usize,
    ) -> Result<()> {
        let group = match context.groups[frame_index].clone() {
            Some(group) => group,
            None => {
                let group = device.create_binding_group(per_object_layout, PER_OBJECT_SET_INDEX)?;
                context.groups[frame_index] = Some(group.clone());
                group
            }
        };

        let bytes = context.mesh_uniform.as_bytes();
        let buffer = match context.buffers[frame_index].clone() {
            Some(buffer) => {
                buffer.update(0, bytes)?;
                buffer
            }
            None => {
                let buffer = device.create_buffer(
                    BufferDesc { size: bytes.len() as u64, usage: BufferUsage::Uniform },
                    bytes,
                )?;
                context.buffers[frame_index] = Some(buffer.clone());
                buffer
            }
        };

        if context.set_references[frame_index].is_none() || context.material_changed[frame_index] {
            context.set_references[frame_index] = Some(DescriptorSetReferences::new(
                global_group.clone(),
                group.clone(),
                material_groups.to_vec(),
            ));
            context.material_changed[frame_index] = false;
        }

        writer.register_uniform_buffer(&group, MESH_UNIFORM_BINDING, &buffer);
        Ok(())
    }

    // ===== SET REFERENCES =====

    /// Current frame slot of the last `update`, or its compute slot
    ///
    /// Lookups never lock the device, so a renderer may hold the device
    /// while it records.
    fn frame_index(&self, last: bool) -> usize {
        if last {
            self.compute_frame_index
        } else {
            self.frame_index
        }
    }

    fn object_set_references(&self, instance_name: &str, object_id: u32, frame_index: usize) -> Option<&DescriptorSetReferences> {
        let Some(key) = self.material_resource_key(instance_name).filter(|key| self.resources.contains_key(*key)) else {
            engine_warn!(LOG_SOURCE, "Material instance '{}' does not exist", instance_name);
            return None;
        };
        let Some(contexts) = self.object_contexts.get(&key) else {
            engine_warn!(LOG_SOURCE, "No per-object set was created for material instance '{}'", instance_name);
            return None;
        };
        let references = contexts
            .iter()
            .find(|context| context.mesh_uniform.object_id == object_id)
            .and_then(|context| context.set_references.get(frame_index)?.as_ref());
        if references.is_none() {
            engine_warn!(
                LOG_SOURCE,
                "Set references of object {} not found for material instance '{}'",
                object_id, instance_name
            );
        }
        references
    }

    /// Sets to bind when drawing `object_id` with `instance_name`
    ///
    /// Uses the current frame slot read by the last `update`.
    pub fn descriptor_set_references(&self, instance_name: &str, object_id: u32) -> Option<DescriptorSetReferences> {
        let frame_index = self.frame_index(false);
        self.object_set_references(instance_name, object_id, frame_index).cloned()
    }

    /// Sets to bind when dispatching the compute task of `material_name` for `object_id`
    ///
    /// Uses the last frame slot; set 0 is the compute mirror of the global set.
    pub fn compute_descriptor_set_references(&self, material_name: &str, object_id: u32) -> Option<DescriptorSetReferences> {
        let frame_index = self.frame_index(true);
        let mut references = self.object_set_references(material_name, object_id, frame_index)?.clone();
        let compute_group = self.global_context.compute_groups.get(frame_index)?;
        references.replace(GLOBAL_SET_INDEX, compute_group.clone());
        Some(references)
    }

    // ===== ASSETS =====

    fn with_monitor(&self, f: impl FnOnce(&mut dyn AssetMonitor)) {
        let Some(monitor) = &self.asset_monitor else {
            return;
        };
        match monitor.lock() {
            Ok(mut guard) => f(&mut *guard),
            Err(_) => engine_error!(LOG_SOURCE, "Asset monitor lock poisoned"),
        }
    }

    fn material_tags(material_name: &str) -> TagInfos {
        let mut tags = TagInfos::default();
        tags.insert(TAG_MATERIAL_NAME.to_string(), material_name.to_string());
        tags
    }

    /// Shader files a material reads from disk
    fn watched_shader_paths(material: &Material) -> Vec<String> {
        let mut paths = vec![material.vertex_shader_path(), material.fragment_shader_path()];
        if let Some(task) = material.compute_task() {
            paths.push(task.compute_shader_path());
        }
        paths
            .into_iter()
            .filter(|path| !path.is_empty() && !path.starts_with(BUILTIN_PREFIX))
            .map(str::to_string)
            .collect()
    }

    fn create_material_from_asset(&mut self, asset: MaterialAsset) -> MaterialLayoutKey {
        let name = asset.name().to_string();
        let material = asset.into_material();
        let key = self.create_material(&name, &material);
        self.with_monitor(|monitor| {
            for path in Self::watched_shader_paths(&material) {
                monitor.register_asset(AssetType::Shader, &path, Self::material_tags(&name));
            }
        });
        key
    }

    /// Load a material file and register it for hot reload
    ///
    /// Returns the material name, or the error material name when the file
    /// cannot be loaded. Failed files stay watched so a fix is picked up.
    pub fn register_material_asset(&mut self, path: &str) -> String {
        let asset = MaterialAsset::load(path, self.asset_reader.as_ref(), self.frames_in_flight())
            .and_then(|asset| match asset.name().is_empty() {
                true => Err(Error::AssetError(format!("Material asset '{}' has no name", path))),
                false => Ok(asset),
            });
        match asset {
            Ok(asset) => {
                let name = asset.name().to_string();
                self.with_monitor(|monitor| monitor.register_asset(AssetType::Material, path, Self::material_tags(&name)));
                self.create_material_from_asset(asset);
                name
            }
            Err(err) => {
                self.with_monitor(|monitor| monitor.register_asset(AssetType::Material, path, Self::material_tags(path)));
                engine_error!(LOG_SOURCE, "Failed to create material from '{}': {}", path, err);
                self.config.error_material_name.clone()
            }
        }
    }

    /// Load a material instance file and register it for hot reload
    ///
    /// The parent material must already exist. Returns the instance name,
    /// or the error material name on failure.
    pub fn register_material_instance_asset(&mut self, path: &str) -> String {
        let asset = match MaterialInstanceAsset::load(path, self.asset_reader.as_ref()) {
            Ok(asset) => asset,
            Err(err) => {
                engine_error!(LOG_SOURCE, "Failed to create material instance from '{}': {}", path, err);
                return self.config.error_material_name.clone();
            }
        };

        let name = asset.name().to_string();
        let parent_name = asset.parent_material_name().to_string();
        self.with_monitor(|monitor| {
            let mut tags = Self::material_tags(&parent_name);
            tags.insert(TAG_MATERIAL_INSTANCE_NAME.to_string(), name.clone());
            monitor.register_asset(AssetType::MaterialInstance, path, tags);
        });

        if name.is_empty() {
            engine_error!(LOG_SOURCE, "Material instance asset '{}' has no name", path);
            return self.config.error_material_name.clone();
        }
        if self.material_layout_key(&parent_name).is_none() {
            engine_error!(
                LOG_SOURCE,
                "Parent material '{}' of material instance asset '{}' does not exist",
                parent_name, path
            );
            return self.config.error_material_name.clone();
        }

        let key = self.create_material_instance(&name, &parent_name);
        if let Some(resource) = self.resources.get_mut(key) {
            asset.fill(resource.instance_mut());
        }
        name
    }

    /// Stop watching a material file and its shaders, and remove the material
    pub fn unregister_material_asset(&mut self, path: &str) {
        self.with_monitor(|monitor| monitor.unregister_asset(AssetType::Material, path));
        match MaterialAsset::load(path, self.asset_reader.as_ref(), self.frames_in_flight()) {
            Ok(asset) => {
                self.with_monitor(|monitor| {
                    for shader_path in Self::watched_shader_paths(asset.material()) {
                        monitor.unregister_asset(AssetType::Shader, &shader_path);
                    }
                });
                self.remove_material(asset.name());
            }
            Err(err) => engine_error!(LOG_SOURCE, "Failed to unregister material asset '{}': {}", path, err),
        }
    }

    /// Stop watching a material instance file and remove the instance
    pub fn unregister_material_instance_asset(&mut self, path: &str) {
        self.with_monitor(|monitor| monitor.unregister_asset(AssetType::MaterialInstance, path));
        match MaterialInstanceAsset::load(path, self.asset_reader.as_ref()) {
            Ok(asset) => {
                self.remove_material_instance(asset.name());
            }
            Err(err) => engine_error!(LOG_SOURCE, "Failed to unregister material instance asset '{}': {}", path, err),
        }
    }

    // ===== HOT RELOAD =====

    /// A material file changed: reload it, dropping the old material if its name changed
    pub fn on_material_modified(&mut self, path: &str, tags: &mut TagInfos) {
        let asset = match MaterialAsset::load(path, self.asset_reader.as_ref(), self.frames_in_flight()) {
            Ok(asset) if !asset.name().is_empty() => asset,
            Ok(_) => {
                engine_error!(LOG_SOURCE, "Reloaded material asset '{}' has no name", path);
                return;
            }
            Err(err) => {
                engine_error!(LOG_SOURCE, "Failed to reload material asset '{}': {}", path, err);
                return;
            }
        };

        let new_name = asset.name().to_string();
        let old_name = tags.get(TAG_MATERIAL_NAME).cloned().unwrap_or_default();
        if new_name != old_name {
            self.remove_material(&old_name);
            tags.insert(TAG_MATERIAL_NAME.to_string(), new_name);
        }
        self.create_material_from_asset(asset);
    }

    /// A material instance file changed: re-apply its overrides
    ///
    /// A renamed instance, or one moved to another existing parent, replaces
    /// the old entry.
    pub fn on_material_instance_modified(&mut self, path: &str, tags: &mut TagInfos) {
        let asset = match MaterialInstanceAsset::load(path, self.asset_reader.as_ref()) {
            Ok(asset) => asset,
            Err(err) => {
                engine_error!(LOG_SOURCE, "Failed to reload material instance asset '{}': {}", path, err);
                return;
            }
        };

        let new_name = asset.name().to_string();
        let parent_name = asset.parent_material_name().to_string();
        let old_name = tags.get(TAG_MATERIAL_INSTANCE_NAME).cloned().unwrap_or_default();
        let old_parent = tags.get(TAG_MATERIAL_NAME).cloned().unwrap_or_default();

        if new_name != old_name || parent_name != old_parent {
            if self.material_layout_key(&parent_name).is_some() {
                self.remove_material_instance(&old_name);
                self.create_material_instance(&new_name, &parent_name);
                tags.insert(TAG_MATERIAL_INSTANCE_NAME.to_string(), new_name.clone());
                tags.insert(TAG_MATERIAL_NAME.to_string(), parent_name);
            } else {
                engine_error!(
                    LOG_SOURCE,
                    "Cannot recreate material instance '{}': parent material '{}' does not exist",
                    new_name, parent_name
                );
            }
        }

        let Some(key) = self.material_resource_key(&new_name) else {
            return;
        };
        if let Some(resource) = self.resources.get_mut(key) {
            // Removed overrides fall back to the parent value
            let instance = resource.instance_mut();
            instance.reset();
            instance.material_mut().mark_all_modified();
            asset.fill(instance);
            self.dirty_resources.insert(key);
        }
    }

    /// A shader file changed: recompile the pipelines of the material using it
    ///
    /// Shaders no longer used by their tagged material stop being watched.
    pub fn on_shader_modified(&mut self, path: &str, tags: &mut TagInfos) {
        let material_name = tags.get(TAG_MATERIAL_NAME).cloned().unwrap_or_default();
        let in_use = self
            .material(&material_name)
            .is_some_and(|material| Self::watched_shader_paths(material).iter().any(|watched| watched == path));
        if !in_use {
            self.with_monitor(|monitor| monitor.unregister_asset(AssetType::Shader, path));
            return;
        }

        let device_arc = self.device.clone();
        let mut device = match lock_device(&device_arc) {
            Ok(device) => device,
            Err(err) => {
                engine_error!(LOG_SOURCE, "Cannot recompile '{}': {}", path, err);
                return;
            }
        };
        let Some(layout) = self.layout_names.get(&material_name).and_then(|key| self.layouts.get_mut(*key)) else {
            return;
        };
        // Resources are unchanged, only the pipelines are rebuilt
        layout.clear_shaders();
        Self::rebuild_pipelines_or_error_shaders(layout, &mut *device, self.render_pass.as_ref(), self.asset_reader.as_ref());
        engine_info!(LOG_SOURCE, "Recompiled material '{}' after '{}' changed", material_name, path);
    }

    fn route(manager: &Arc<Mutex<Self>>, handler: fn(&mut Self, &str, &mut TagInfos)) -> ModifiedCallback {
        let weak = Arc::downgrade(manager);
        Arc::new(move |path: &str, tags: &mut TagInfos| {
            let Some(manager) = weak.upgrade() else {
                return;
            };
            match manager.lock() {
                Ok(mut guard) => handler(&mut guard, path, tags),
                Err(_) => engine_error!(LOG_SOURCE, "MaterialManager lock poisoned, dropped change of '{}'", path),
            };
        })
    }

    /// Route the asset monitor's modified callbacks to a shared manager
    pub fn install_asset_callbacks(manager: &Arc<Mutex<Self>>) -> Result<()> {
        let monitor = manager
            .lock()
            .map_err(|_| Error::BackendError("MaterialManager lock poisoned".to_string()))?
            .asset_monitor
            .clone();
        let Some(monitor) = monitor else {
            return Ok(());
        };

        let mut monitor = monitor
            .lock()
            .map_err(|_| Error::BackendError("Asset monitor lock poisoned".to_string()))?;
        monitor.set_modified_callback(AssetType::Material, Self::route(manager, Self::on_material_modified));
        monitor.set_modified_callback(
            AssetType::MaterialInstance,
            Self::route(manager, Self::on_material_instance_modified),
        );
        monitor.set_modified_callback(AssetType::Shader, Self::route(manager, Self::on_shader_modified));
        Ok(())
    }
}

#[cfg(test)]
#[path = "material_manager_tests.rs"]
mod tests;
