/// MaterialResource - GPU state of one material instance
///
/// Owns the instance values, the packed per-stage uniform buffers, the
/// texture handles and the SSBO buffers, and one binding group per material
/// stage for every frame in flight. Binding numbers come from the layout's
/// `BindingPlan`, the same pass that generated the shader declarations.

use std::collections::BTreeMap;
use std::sync::Arc;
use slotmap::new_key_type;
use crate::asset::texture_pool::TexturePool;
use crate::{engine_error, engine_warn};
use crate::error::Result;
use crate::graphics_device::{
    BindingGroup, BindingGroupWriter, Buffer, BufferDesc, BufferUsage, ColorSpace, GraphicsDevice, Texture,
    TextureAssetInfo,
};
use crate::material::binding_plan::{BindingPlan, BindingSlot};
use crate::material::compute_task::{ComputeTask, SsboInfo};
use crate::material::material::{Material, ParameterKind, ParameterValue};
use crate::material::material_instance::MaterialInstance;
use crate::material::material_layout::{MaterialLayout, MaterialLayoutKey};
use crate::material::stage::{MaterialStage, STAGE_UNIFORM_BINDING};

const LOG_SOURCE: &str = "galaxy3d::MaterialResource";

new_key_type! {
    /// Stable key of a MaterialResource within a MaterialManager
    ///
    /// Keys remain valid when other resources are removed.
    pub struct MaterialResourceKey;
}

/// Collaborators borrowed by `MaterialResource::update`
pub struct ResourceUpdateContext<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub writer: &'a mut BindingGroupWriter,
    pub texture_pool: &'a mut dyn TexturePool,
    /// Substituted for texture parameters with an empty path
    pub default_texture: &'a TextureAssetInfo,
}

struct TextureResource {
    binding: u32,
    texture: Option<Arc<dyn Texture>>,
}

#[derive(Default)]
struct StageResource {
    uniforms: Vec<f32>,
    /// One per frame in flight
    uniform_buffers: Vec<Arc<dyn Buffer>>,
    textures: BTreeMap<String, TextureResource>,
    /// Physical buffers of each SSBO, indexed by buffer index
    storage_buffers: BTreeMap<String, Vec<Arc<dyn Buffer>>>,
}

/// Binding groups of one frame, keyed by material stage
type StageGroups = BTreeMap<MaterialStage, Arc<dyn BindingGroup>>;

pub struct MaterialResource {
    layout_key: MaterialLayoutKey,
    instance: MaterialInstance,
    frames_in_flight: usize,
    stage_resources: BTreeMap<MaterialStage, StageResource>,
    in_flight_groups: Vec<StageGroups>,
    should_reregister_textures: bool,
}

impl MaterialResource {
    pub fn new(layout_key: MaterialLayoutKey, instance: MaterialInstance, frames_in_flight: usize) -> Self {
        Self {
            layout_key,
            instance,
            frames_in_flight: frames_in_flight.max(1),
            stage_resources: BTreeMap::new(),
            in_flight_groups: Vec::new(),
            should_reregister_textures: false,
        }
    }

    // ===== ACCESSORS =====

    pub fn layout_key(&self) -> MaterialLayoutKey {
        self.layout_key
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub fn instance(&self) -> &MaterialInstance {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut MaterialInstance {
        &mut self.instance
    }

    pub fn set_instance(&mut self, instance: MaterialInstance) {
        self.instance = instance;
    }

    /// True once binding groups were allocated by `reload_material_layout`
    pub fn has_binding_groups(&self) -> bool {
        !self.in_flight_groups.is_empty()
    }

    pub fn binding_group(&self, frame_index: usize, stage: MaterialStage) -> Option<&Arc<dyn BindingGroup>> {
        self.in_flight_groups.get(frame_index)?.get(&stage)
    }

    /// Material binding groups of one frame, in set-index order
    pub fn binding_groups(&self, frame_index: usize) -> Vec<Arc<dyn BindingGroup>> {
        self.in_flight_groups
            .get(frame_index)
            .map(|groups| groups.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Packed uniform floats of a stage (scalars, padding, vectors)
    pub fn uniforms(&self, stage: MaterialStage) -> &[f32] {
        self.stage_resources.get(&stage).map(|resource| resource.uniforms.as_slice()).unwrap_or_default()
    }

    /// Texture currently bound for parameter `name`
    pub fn texture(&self, stage: MaterialStage, name: &str) -> Option<&Arc<dyn Texture>> {
        self.stage_resources.get(&stage)?.textures.get(name)?.texture.as_ref()
    }

    /// Physical buffers of an SSBO
    pub fn storage_buffers(&self, stage: MaterialStage, name: &str) -> Option<&[Arc<dyn Buffer>]> {
        self.stage_resources.get(&stage)?.storage_buffers.get(name).map(Vec::as_slice)
    }

    /// Buffer written by the compute pass of `frame_index` for the vertex-input SSBO
    pub fn vertex_input_storage_buffer(&self, layout: &MaterialLayout, frame_index: usize) -> Option<&Arc<dyn Buffer>> {
        let info = layout.material().compute_task()?.vertex_input_ssbo()?;
        let buffers = self.storage_buffers(info.stage, &info.name)?;
        let newest = buffers.len().checked_sub(1)?;
        buffers.get(ComputeTask::alias_buffer_index(newest, buffers.len(), frame_index))
    }

    // ===== LAYOUT RELOAD =====

    /// Rebind to the layout's current set layouts
    ///
    /// The instance is re-derived from the layout's material when it was
    /// created from another revision; binding groups are reallocated and
    /// unmodified textures are registered again on the next update.
    pub fn reload_material_layout(
        &mut self,
        layout: &MaterialLayout,
        device: &mut dyn GraphicsDevice,
        writer: &mut BindingGroupWriter,
    ) -> Result<()> {
        self.should_reregister_textures = true;

        let handle = layout.handle(self.layout_key);
        if !self.instance.is_instance_of(handle) {
            self.instance = self.instance.make_redirected_instance(layout.material(), handle);
        }

        for group in self.in_flight_groups.iter().flat_map(BTreeMap::values) {
            writer.discard_group(group);
        }

        let mut in_flight_groups = Vec::with_capacity(self.frames_in_flight);
        for _ in 0..self.frames_in_flight {
            let mut groups = StageGroups::new();
            for &stage in layout.layout_stages() {
                if let Some(stage_layout) = layout.stage_layout(stage) {
                    groups.insert(stage, device.create_binding_group(stage_layout, stage.set_index())?);
                }
            }
            in_flight_groups.push(groups);
        }
        self.in_flight_groups = in_flight_groups;
        Ok(())
    }

    // ===== UPDATE =====

    /// Upload the instance values and register every binding write
    ///
    /// A failing buffer or texture is logged and skipped; the remaining
    /// stages, textures and SSBOs are still submitted. The first failure is
    /// returned once every step has run.
    pub fn update(&mut self, layout: &MaterialLayout, ctx: &mut ResourceUpdateContext) -> Result<()> {
        let uniforms = self.submit_uniforms(layout, ctx);
        self.submit_textures(layout, ctx);
        let storage = if layout.material().has_compute_task() {
            self.submit_storage_buffers(layout, ctx)
        } else {
            Ok(())
        };
        self.instance.material_mut().mark_all_submitted();
        uniforms.and(storage)
    }

    fn pack_uniforms(material: &Material, stage: MaterialStage) -> Vec<f32> {
        let mut uniforms: Vec<f32> = material
            .parameters(stage, ParameterKind::Scalar)
            .filter_map(|parameter| parameter.as_scalar())
            .collect();
        if uniforms.is_empty() && material.vector_count(stage) == 0 {
            return uniforms;
        }
        uniforms.resize(uniforms.len() + material.scalar_padding_size(stage) as usize, 0.0);
        for vector in material.parameters(stage, ParameterKind::Vector).filter_map(|parameter| parameter.as_vector()) {
            uniforms.extend_from_slice(&vector.to_array());
        }
        uniforms
    }

    /// Repack each stage's uniform block and recreate its per-frame buffers
    fn submit_uniforms(&mut self, layout: &MaterialLayout, ctx: &mut ResourceUpdateContext) -> Result<()> {
        let mut result = Ok(());
        for &stage in layout.layout_stages() {
            let uniforms = Self::pack_uniforms(self.instance.material(), stage);
            let resource = self.stage_resources.entry(stage).or_default();
            resource.uniforms = uniforms;
            resource.uniform_buffers.clear();
            // Empty blocks are not declared in the shader
            if resource.uniforms.is_empty() {
                continue;
            }

            let bytes: &[u8] = bytemuck::cast_slice(&resource.uniforms);
            for frame_index in 0..self.frames_in_flight {
                let buffer = match ctx.device.create_buffer(
                    BufferDesc { size: bytes.len() as u64, usage: BufferUsage::Uniform },
                    bytes,
                ) {
                    Ok(buffer) => buffer,
                    Err(err) => {
                        engine_error!(LOG_SOURCE, "Uniform buffer of stage {:?} not created: {}", stage, err);
                        result = result.and(Err(err));
                        break;
                    }
                };
                if let Some(group) = self.in_flight_groups.get(frame_index).and_then(|groups| groups.get(&stage)) {
                    ctx.writer.register_uniform_buffer(group, STAGE_UNIFORM_BINDING, &buffer);
                }
                resource.uniform_buffers.push(buffer);
            }
        }
        result
    }

    fn register_texture_all_frames(
        in_flight_groups: &[StageGroups],
        writer: &mut BindingGroupWriter,
        stage: MaterialStage,
        binding: u32,
        texture: &Arc<dyn Texture>,
    ) {
        for groups in in_flight_groups {
            if let Some(group) = groups.get(&stage) {
                writer.register_texture(group, binding, texture);
            }
        }
    }

    /// Sync texture entries with the instance, then load modified textures
    ///
    /// A texture the pool cannot load is replaced by the default texture.
    fn submit_textures(&mut self, layout: &MaterialLayout, ctx: &mut ResourceUpdateContext) {
        let reregister = std::mem::replace(&mut self.should_reregister_textures, false);

        for &stage in layout.layout_stages() {
            let plan = BindingPlan::new(layout.material(), stage, self.frames_in_flight);
            let resource = self.stage_resources.entry(stage).or_default();

            // Drop entries whose parameter is gone, refresh binding numbers
            let material = self.instance.material();
            resource.textures.retain(|name, _| material.texture(stage, name).is_some());
            for parameter in material.parameters(stage, ParameterKind::Texture) {
                let Some(binding) = plan.texture_binding(&parameter.name) else {
                    engine_warn!(LOG_SOURCE, "Texture '{}' has no binding in the current layout", parameter.name);
                    resource.textures.remove(&parameter.name);
                    continue;
                };
                resource.textures
                    .entry(parameter.name.clone())
                    .and_modify(|entry| entry.binding = binding)
                    .or_insert(TextureResource { binding, texture: None });
            }

            for parameter in self.instance.material_mut().parameters_mut(stage, ParameterKind::Texture) {
                let Some(entry) = resource.textures.get_mut(&parameter.name) else {
                    continue;
                };
                let Some(info) = parameter.as_texture() else {
                    continue;
                };

                let mut info = info.clone();
                if info.color_space == ColorSpace::Undefined {
                    engine_warn!(LOG_SOURCE, "Texture '{}' has no color space, using SRGB", parameter.name);
                    info.color_space = ColorSpace::SRGB;
                    parameter.value = ParameterValue::Texture(info.clone());
                }

                if !parameter.modified && entry.texture.is_some() {
                    if reregister {
                        if let Some(texture) = &entry.texture {
                            Self::register_texture_all_frames(&self.in_flight_groups, ctx.writer, stage, entry.binding, texture);
                        }
                    }
                    continue;
                }

                let request = if info.path.is_empty() {
                    engine_warn!(LOG_SOURCE, "Texture '{}' has an empty path, using the default texture", parameter.name);
                    ctx.default_texture.clone()
                } else {
                    info
                };
                let texture = match ctx.texture_pool.texture(&request) {
                    Ok(texture) => texture,
                    Err(err) => {
                        engine_error!(LOG_SOURCE, "Texture '{}' ({}) not loaded, using the default texture: {}", parameter.name, request.path, err);
                        match ctx.texture_pool.texture(ctx.default_texture) {
                            Ok(texture) => texture,
                            Err(err) => {
                                engine_error!(LOG_SOURCE, "Default texture not loaded, '{}' left unbound: {}", parameter.name, err);
                                entry.texture = None;
                                continue;
                            }
                        }
                    }
                };
                Self::register_texture_all_frames(&self.in_flight_groups, ctx.writer, stage, entry.binding, &texture);
                entry.texture = Some(texture);
                parameter.modified = false;
            }
        }
    }

    fn create_storage_buffers(info: &SsboInfo, count: usize, device: &mut dyn GraphicsDevice) -> Result<Vec<Arc<dyn Buffer>>> {
        let data = info.initial_data();
        (0..count)
            .map(|_| {
                device.create_buffer(
                    BufferDesc { size: info.byte_size(), usage: info.usage.buffer_usage() },
                    &data,
                )
            })
            .collect()
    }

    /// Sync SSBO buffers with the compute task and register every alias
    ///
    /// Alias `k` of `n` lags `n - 1 - k` frames; while recording frame slot
    /// `f` it binds buffer `(f % n + n - lag) % n`.
    fn submit_storage_buffers(&mut self, layout: &MaterialLayout, ctx: &mut ResourceUpdateContext) -> Result<()> {
        let Some(task) = layout.material().compute_task() else {
            return Ok(());
        };

        for (stage, resource) in self.stage_resources.iter_mut() {
            resource.storage_buffers.retain(|name, _| {
                task.find_ssbo_info(name).is_some_and(|info| info.stage == *stage)
            });
        }

        let mut result = Ok(());
        let mut plans: BTreeMap<MaterialStage, BindingPlan> = BTreeMap::new();
        for info in task.ssbo_infos() {
            if info.byte_size() == 0 {
                engine_warn!(LOG_SOURCE, "SSBO '{}' has no elements, skipped", info.name);
                continue;
            }
            let count = ComputeTask::num_ssbos(info, self.frames_in_flight);
            let resource = self.stage_resources.entry(info.stage).or_default();
            let stale = resource.storage_buffers.get(&info.name).map_or(true, |buffers| {
                buffers.len() != count || buffers.iter().any(|buffer| buffer.size() != info.byte_size())
            });
            if stale {
                match Self::create_storage_buffers(info, count, ctx.device) {
                    Ok(buffers) => {
                        resource.storage_buffers.insert(info.name.clone(), buffers);
                    }
                    Err(err) => {
                        engine_error!(LOG_SOURCE, "SSBO '{}' not allocated: {}", info.name, err);
                        resource.storage_buffers.remove(&info.name);
                        result = result.and(Err(err));
                        continue;
                    }
                }
            }
            let Some(buffers) = resource.storage_buffers.get(&info.name) else {
                continue;
            };

            let plan = plans
                .entry(info.stage)
                .or_insert_with(|| BindingPlan::new(layout.material(), info.stage, self.frames_in_flight));
            for entry in plan.storage_aliases(&info.name) {
                let BindingSlot::StorageAlias { alias_index, alias_count, .. } = entry.slot else {
                    continue;
                };
                for (frame_index, groups) in self.in_flight_groups.iter().enumerate() {
                    let Some(group) = groups.get(&info.stage) else {
                        continue;
                    };
                    let buffer_index = ComputeTask::alias_buffer_index(alias_index, alias_count, frame_index);
                    if let Some(buffer) = buffers.get(buffer_index) {
                        ctx.writer.register_storage_buffer(group, entry.binding, buffer);
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "material_resource_tests.rs"]
mod tests;
