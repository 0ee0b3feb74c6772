/// MaterialLayout - binding layouts and pipelines of one material
///
/// A layout owns a copy of its material, one set layout per material stage,
/// the compiled shaders and the pipelines built from them. Set layouts are
/// stored in set-index order, prefixed by the shared global and per-object
/// layouts:
///
/// ```text
/// raw_layouts = [global, per_object, vertex, fragment, shared, (compute, compute_vertex, compute_fragment)]
/// ```
///
/// The generation counter changes whenever the material value is replaced,
/// so instances can detect that their parent went stale.

use std::collections::BTreeMap;
use std::sync::Arc;
use slotmap::new_key_type;
use crate::asset::asset_reader::{read_asset_text, AssetReader, ERROR_FRAGMENT_SHADER, ERROR_VERTEX_SHADER};
use crate::asset::material_asset::MaterialAsset;
use crate::{engine_debug, engine_error};
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroupLayout, BlendMode, ComputePipelineDesc, CullMode, Domain, GraphicsDevice, Pipeline,
    PipelineDesc, RenderPassInfo, Shader, ShaderDesc, ShaderStage,
};
use crate::material::binding_plan::BindingPlan;
use crate::material::compute_task::ComputeTask;
use crate::material::material::Material;
use crate::material::material_instance::MaterialHandle;
use crate::material::stage::MaterialStage;

const LOG_SOURCE: &str = "galaxy3d::MaterialLayout";

/// Entry point of every material shader
pub const SHADER_ENTRY_POINT: &str = "main";

// ===== SLOT MAP KEY =====

new_key_type! {
    /// Stable key of a MaterialLayout within a MaterialManager
    pub struct MaterialLayoutKey;
}

/// Compute pipeline initializing one SSBO
#[derive(Clone)]
pub struct SsboInitPipeline {
    pub ssbo_name: String,
    pub pipeline: Arc<dyn Pipeline>,
}

pub struct MaterialLayout {
    material: Material,
    generation: u64,
    frames_in_flight: usize,
    stage_layouts: BTreeMap<MaterialStage, Arc<dyn BindingGroupLayout>>,
    raw_layouts: Vec<Arc<dyn BindingGroupLayout>>,
    vertex_shader: Option<Arc<dyn Shader>>,
    fragment_shader: Option<Arc<dyn Shader>>,
    compute_shader: Option<Arc<dyn Shader>>,
    pipeline: Option<Arc<dyn Pipeline>>,
    compute_pipeline: Option<Arc<dyn Pipeline>>,
    ssbo_init_pipelines: Vec<SsboInitPipeline>,
    should_init_ssbos: Vec<bool>,
}

impl MaterialLayout {
    pub fn new(material: Material, frames_in_flight: usize) -> Self {
        Self {
            material,
            generation: 0,
            frames_in_flight: frames_in_flight.max(1),
            stage_layouts: BTreeMap::new(),
            raw_layouts: Vec::new(),
            vertex_shader: None,
            fragment_shader: None,
            compute_shader: None,
            pipeline: None,
            compute_pipeline: None,
            ssbo_init_pipelines: Vec::new(),
            should_init_ssbos: vec![false; frames_in_flight.max(1)],
        }
    }

    // ===== MATERIAL =====

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Mutable material access; the edit counts as a new revision and
    /// compiled shaders are dropped since declarations may change
    pub fn material_mut(&mut self) -> &mut Material {
        self.generation += 1;
        self.clear_shaders();
        &mut self.material
    }

    /// Replace the material; compiled shaders are dropped and rebuilt on next update
    pub fn set_material(&mut self, material: Material) {
        self.material = material;
        self.generation += 1;
        self.clear_shaders();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Handle of the current revision under `key`
    pub fn handle(&self, key: MaterialLayoutKey) -> MaterialHandle {
        MaterialHandle::new(key, self.generation)
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Drop compiled shaders so the next pipeline update recompiles them
    pub fn clear_shaders(&mut self) {
        self.vertex_shader = None;
        self.fragment_shader = None;
        self.compute_shader = None;
    }

    // ===== SET LAYOUTS =====

    /// Material stages that own a set layout, in set-index order
    pub fn layout_stages(&self) -> &'static [MaterialStage] {
        if self.material.has_compute_task() {
            &MaterialStage::ALL
        } else {
            &MaterialStage::GRAPHICS
        }
    }

    /// Rebuild every stage set layout from the material's binding plans
    pub fn update_descriptor_set_layouts(
        &mut self,
        device: &mut dyn GraphicsDevice,
        global_layout: &Arc<dyn BindingGroupLayout>,
        per_object_layout: &Arc<dyn BindingGroupLayout>,
    ) -> Result<()> {
        let mut stage_layouts = BTreeMap::new();
        let mut raw_layouts = vec![global_layout.clone(), per_object_layout.clone()];
        for &stage in self.layout_stages() {
            let plan = BindingPlan::new(&self.material, stage, self.frames_in_flight);
            let layout = device.create_binding_group_layout(plan.layout_desc())?;
            raw_layouts.push(layout.clone());
            stage_layouts.insert(stage, layout);
        }
        engine_debug!(LOG_SOURCE, "Rebuilt {} stage set layouts", stage_layouts.len());
        self.stage_layouts = stage_layouts;
        self.raw_layouts = raw_layouts;
        Ok(())
    }

    pub fn stage_layout(&self, stage: MaterialStage) -> Option<&Arc<dyn BindingGroupLayout>> {
        self.stage_layouts.get(&stage)
    }

    /// Layouts in set-index order, starting with the global set
    pub fn raw_layouts(&self) -> &[Arc<dyn BindingGroupLayout>] {
        &self.raw_layouts
    }

    // ===== SHADERS =====

    fn compile(device: &mut dyn GraphicsDevice, stage: ShaderStage, code: &str, debug_name: &str) -> Result<Arc<dyn Shader>> {
        device.create_shader(ShaderDesc {
            source: code,
            stage,
            entry_point: SHADER_ENTRY_POINT,
            debug_name,
        })
    }

    pub fn compile_vertex_shader(&mut self, device: &mut dyn GraphicsDevice, code: &str) -> Result<()> {
        let shader = Self::compile(device, ShaderStage::Vertex, code, self.material.vertex_shader_path())?;
        self.vertex_shader = Some(shader);
        Ok(())
    }

    pub fn compile_fragment_shader(&mut self, device: &mut dyn GraphicsDevice, code: &str) -> Result<()> {
        let shader = Self::compile(device, ShaderStage::Fragment, code, self.material.fragment_shader_path())?;
        self.fragment_shader = Some(shader);
        Ok(())
    }

    pub fn compile_compute_shader(&mut self, device: &mut dyn GraphicsDevice, code: &str) -> Result<()> {
        let debug_name = self.material.compute_task().map(ComputeTask::compute_shader_path).unwrap_or_default();
        let shader = Self::compile(device, ShaderStage::Compute, code, debug_name)?;
        self.compute_shader = Some(shader);
        Ok(())
    }

    pub fn has_vertex_shader(&self) -> bool {
        self.vertex_shader.is_some()
    }

    pub fn has_fragment_shader(&self) -> bool {
        self.fragment_shader.is_some()
    }

    /// Compile the error material's shaders against this material's declarations
    pub fn apply_error_shaders(
        &mut self,
        device: &mut dyn GraphicsDevice,
        render_pass: &dyn RenderPassInfo,
        reader: &dyn AssetReader,
    ) -> Result<()> {
        let mut error_material = self.material.clone();
        error_material.set_vertex_shader(ERROR_VERTEX_SHADER);
        error_material.set_fragment_shader(ERROR_FRAGMENT_SHADER);
        let asset = MaterialAsset::from_material(&error_material, reader, self.frames_in_flight);

        let vertex = asset.generate_shader_code(ShaderStage::Vertex, None)?;
        let fragment = asset.generate_shader_code(ShaderStage::Fragment, Some(render_pass.input_attachments()))?;
        self.vertex_shader = Some(Self::compile(device, ShaderStage::Vertex, &vertex, ERROR_VERTEX_SHADER)?);
        self.fragment_shader = Some(Self::compile(device, ShaderStage::Fragment, &fragment, ERROR_FRAGMENT_SHADER)?);
        Ok(())
    }

    // ===== PIPELINES =====

    /// Build the graphics pipeline (compute-only materials have none)
    ///
    /// Missing vertex or fragment shaders are generated from the material
    /// and compiled first.
    pub fn update_pipeline(
        &mut self,
        device: &mut dyn GraphicsDevice,
        render_pass: &dyn RenderPassInfo,
        reader: &dyn AssetReader,
    ) -> Result<()> {
        if self.material.is_compute_only() {
            self.pipeline = None;
            return Ok(());
        }

        if self.vertex_shader.is_none() || self.fragment_shader.is_none() {
            let asset = MaterialAsset::from_material(&self.material, reader, self.frames_in_flight);
            if self.vertex_shader.is_none() {
                let code = asset.generate_shader_code(ShaderStage::Vertex, None)?;
                self.compile_vertex_shader(device, &code)?;
            }
            if self.fragment_shader.is_none() {
                let code = asset.generate_shader_code(ShaderStage::Fragment, Some(render_pass.input_attachments()))?;
                self.compile_fragment_shader(device, &code)?;
            }
        }
        let (Some(vertex_shader), Some(fragment_shader)) = (self.vertex_shader.clone(), self.fragment_shader.clone()) else {
            return Err(Error::InvalidState("Graphics shaders are not compiled".to_string()));
        };

        let vertex_layout = match self.material.compute_task().and_then(ComputeTask::vertex_input_ssbo) {
            Some(info) => info.element_layout.vertex_layout(),
            None => self.material.vertex_type().vertex_layout(),
        };
        let domain = self.material.domain();

        let pipeline = device.create_pipeline(PipelineDesc {
            vertex_shader,
            fragment_shader,
            vertex_layout,
            topology: self.material.topology(),
            cull_mode: if self.material.two_sided() { CullMode::None } else { CullMode::Back },
            blend_mode: if domain == Domain::Transparency { BlendMode::Alpha } else { BlendMode::Opaque },
            binding_group_layouts: self.raw_layouts.clone(),
            subpass: render_pass.subpass_index(domain),
            sample_count: render_pass.sample_count(domain),
        })?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Build the compute pipeline and the SSBO init pipelines
    ///
    /// If any init shader fails to compile, SSBO initialization is disabled
    /// for every frame; the main compute pipeline is kept.
    pub fn update_compute_pipeline(&mut self, device: &mut dyn GraphicsDevice, reader: &dyn AssetReader) -> Result<()> {
        let Some(task) = self.material.compute_task().cloned() else {
            self.compute_pipeline = None;
            self.ssbo_init_pipelines.clear();
            return Ok(());
        };

        let asset = MaterialAsset::from_material(&self.material, reader, self.frames_in_flight);
        if self.compute_shader.is_none() {
            let code = asset.generate_shader_code(ShaderStage::Compute, None)?;
            self.compile_compute_shader(device, &code)?;
        }
        let Some(compute_shader) = self.compute_shader.clone() else {
            return Err(Error::InvalidState("Compute shader is not compiled".to_string()));
        };
        self.compute_pipeline = Some(device.create_compute_pipeline(ComputePipelineDesc {
            shader: compute_shader,
            binding_group_layouts: self.raw_layouts.clone(),
        })?);

        self.ssbo_init_pipelines.clear();
        let init_infos = task.resource_init_ssbo_infos();
        if init_infos.is_empty() {
            self.should_init_ssbos.fill(false);
            return Ok(());
        }

        self.should_init_ssbos.fill(true);
        for info in init_infos {
            let pipeline = read_asset_text(reader, &info.init_resource)
                .and_then(|source| asset.generate_init_shader_code(&source))
                .and_then(|code| Self::compile(device, ShaderStage::Compute, &code, &info.init_resource))
                .and_then(|shader| {
                    device.create_compute_pipeline(ComputePipelineDesc {
                        shader,
                        binding_group_layouts: self.raw_layouts.clone(),
                    })
                });
            match pipeline {
                Ok(pipeline) => self.ssbo_init_pipelines.push(SsboInitPipeline {
                    ssbo_name: info.name.clone(),
                    pipeline,
                }),
                Err(err) => {
                    engine_error!(LOG_SOURCE, "SSBO '{}' init shader failed, initialization disabled: {}", info.name, err);
                    self.should_init_ssbos.fill(false);
                    self.ssbo_init_pipelines.clear();
                    break;
                }
            }
        }
        Ok(())
    }

    /// Graphics pipeline
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` for compute-only materials or before the first update.
    pub fn pipeline(&self) -> Result<&Arc<dyn Pipeline>> {
        if self.material.is_compute_only() {
            return Err(Error::InvalidState("Compute-only material has no graphics pipeline".to_string()));
        }
        self.pipeline.as_ref()
            .ok_or_else(|| Error::InvalidState("Graphics pipeline is not built".to_string()))
    }

    /// Compute pipeline
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` if the material has no compute task or before the first update.
    pub fn compute_pipeline(&self) -> Result<&Arc<dyn Pipeline>> {
        if !self.material.has_compute_task() {
            return Err(Error::InvalidState("Material has no compute task".to_string()));
        }
        self.compute_pipeline.as_ref()
            .ok_or_else(|| Error::InvalidState("Compute pipeline is not built".to_string()))
    }

    /// SSBO init pipelines, in SSBO declaration order
    pub fn ssbo_init_pipelines(&self) -> Result<&[SsboInitPipeline]> {
        if !self.material.has_compute_task() {
            return Err(Error::InvalidState("Material has no compute task".to_string()));
        }
        Ok(&self.ssbo_init_pipelines)
    }

    /// Whether SSBOs must be initialized while recording `frame_index`; clears the flag
    pub fn should_init_ssbos_trigger(&mut self, frame_index: usize) -> bool {
        match self.should_init_ssbos.get_mut(frame_index) {
            Some(flag) => std::mem::replace(flag, false),
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "material_layout_tests.rs"]
mod tests;
