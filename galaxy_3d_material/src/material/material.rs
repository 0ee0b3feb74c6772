/// Material - value-type description of a shading model
///
/// A material owns its shader paths, render state and a parameter table
/// keyed by stage. Each stage holds an ordered list of named parameters;
/// scalars, vectors and textures keep independent declaration orders, and
/// a name is unique within one (stage, kind) pair.
///
/// Parameters carry a `modified` flag, set on every write and cleared once
/// the resource layer has uploaded the value.

use std::collections::BTreeMap;
use glam::Vec4;
use crate::asset::asset_reader::{
    DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER, ERROR_VERTEX_SHADER, ERROR_FRAGMENT_SHADER,
};
use crate::graphics_device::{Domain, PrimitiveTopology, TextureAssetInfo};
use crate::material::compute_task::ComputeTask;
use crate::material::stage::MaterialStage;
use crate::material::vertex_type::VertexType;

/// Number of floats in a vector parameter; scalar blocks are padded to it
pub const ELEMENT_ALIGNMENT: u32 = 4;

/// Value of a material parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Scalar(f32),
    Vector(Vec4),
    Texture(TextureAssetInfo),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Scalar(_) => ParameterKind::Scalar,
            ParameterValue::Vector(_) => ParameterKind::Vector,
            ParameterValue::Texture(_) => ParameterKind::Texture,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Scalar,
    Vector,
    Texture,
}

/// A named parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
    /// True until consumed by the resource layer
    pub modified: bool,
}

impl Parameter {
    pub fn kind(&self) -> ParameterKind {
        self.value.kind()
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self.value {
            ParameterValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec4> {
        match self.value {
            ParameterValue::Vector(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureAssetInfo> {
        match &self.value {
            ParameterValue::Texture(info) => Some(info),
            _ => None,
        }
    }
}

/// Parameters per stage, in declaration order
pub type ParameterTable = BTreeMap<MaterialStage, Vec<Parameter>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    domain: Domain,
    topology: PrimitiveTopology,
    two_sided: bool,
    vertex_type: VertexType,
    vertex_shader_path: String,
    fragment_shader_path: String,
    parameters: ParameterTable,
    compute_task: Option<ComputeTask>,
}

impl Default for Material {
    fn default() -> Self {
        Self::empty()
    }
}

impl Material {
    /// Material with no shaders and no parameters
    pub fn empty() -> Self {
        Self {
            domain: Domain::Forward,
            topology: PrimitiveTopology::TriangleList,
            two_sided: false,
            vertex_type: VertexType::Standard,
            vertex_shader_path: String::new(),
            fragment_shader_path: String::new(),
            parameters: ParameterTable::new(),
            compute_task: None,
        }
    }

    /// Built-in material using the default shaders
    pub fn default_material() -> Self {
        let mut material = Self::empty();
        material.set_vertex_shader(DEFAULT_VERTEX_SHADER);
        material.set_fragment_shader(DEFAULT_FRAGMENT_SHADER);
        material
    }

    /// Built-in checkerboard material substituted for broken materials
    pub fn error_material() -> Self {
        let mut material = Self::empty();
        material.set_vertex_shader(ERROR_VERTEX_SHADER);
        material.set_fragment_shader(ERROR_FRAGMENT_SHADER);
        material
    }

    // ===== RENDER STATE =====

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn set_domain(&mut self, domain: Domain) {
        self.domain = domain;
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.topology = topology;
    }

    pub fn two_sided(&self) -> bool {
        self.two_sided
    }

    pub fn set_two_sided(&mut self, two_sided: bool) {
        self.two_sided = two_sided;
    }

    pub fn vertex_type(&self) -> VertexType {
        self.vertex_type
    }

    pub fn set_vertex_type(&mut self, vertex_type: VertexType) {
        self.vertex_type = vertex_type;
    }

    pub fn vertex_shader_path(&self) -> &str {
        &self.vertex_shader_path
    }

    pub fn set_vertex_shader(&mut self, path: impl Into<String>) {
        self.vertex_shader_path = path.into();
    }

    pub fn fragment_shader_path(&self) -> &str {
        &self.fragment_shader_path
    }

    pub fn set_fragment_shader(&mut self, path: impl Into<String>) {
        self.fragment_shader_path = path.into();
    }

    // ===== PARAMETERS =====

    /// Insert or overwrite a parameter; the parameter is marked modified
    pub fn set_parameter(&mut self, stage: MaterialStage, name: &str, value: ParameterValue) {
        let kind = value.kind();
        let parameters = self.parameters.entry(stage).or_default();
        match parameters.iter_mut().find(|p| p.kind() == kind && p.name == name) {
            Some(parameter) => {
                parameter.value = value;
                parameter.modified = true;
            }
            None => parameters.push(Parameter {
                name: name.to_string(),
                value,
                modified: true,
            }),
        }
    }

    pub fn set_scalar(&mut self, stage: MaterialStage, name: &str, value: f32) {
        self.set_parameter(stage, name, ParameterValue::Scalar(value));
    }

    pub fn set_vector(&mut self, stage: MaterialStage, name: &str, value: Vec4) {
        self.set_parameter(stage, name, ParameterValue::Vector(value));
    }

    pub fn set_texture(&mut self, stage: MaterialStage, name: &str, info: TextureAssetInfo) {
        self.set_parameter(stage, name, ParameterValue::Texture(info));
    }

    /// Remove a parameter; returns false if it did not exist
    pub fn remove_parameter(&mut self, stage: MaterialStage, kind: ParameterKind, name: &str) -> bool {
        let Some(parameters) = self.parameters.get_mut(&stage) else {
            return false;
        };
        let before = parameters.len();
        parameters.retain(|p| !(p.kind() == kind && p.name == name));
        let removed = parameters.len() != before;
        if parameters.is_empty() {
            self.parameters.remove(&stage);
        }
        removed
    }

    pub fn parameter(&self, stage: MaterialStage, kind: ParameterKind, name: &str) -> Option<&Parameter> {
        self.parameters
            .get(&stage)?
            .iter()
            .find(|p| p.kind() == kind && p.name == name)
    }

    pub fn parameter_mut(&mut self, stage: MaterialStage, kind: ParameterKind, name: &str) -> Option<&mut Parameter> {
        self.parameters
            .get_mut(&stage)?
            .iter_mut()
            .find(|p| p.kind() == kind && p.name == name)
    }

    pub fn scalar(&self, stage: MaterialStage, name: &str) -> Option<f32> {
        self.parameter(stage, ParameterKind::Scalar, name)?.as_scalar()
    }

    pub fn vector(&self, stage: MaterialStage, name: &str) -> Option<Vec4> {
        self.parameter(stage, ParameterKind::Vector, name)?.as_vector()
    }

    pub fn texture(&self, stage: MaterialStage, name: &str) -> Option<&TextureAssetInfo> {
        self.parameter(stage, ParameterKind::Texture, name)?.as_texture()
    }

    /// Parameters of one kind in `stage`, in declaration order
    pub fn parameters(&self, stage: MaterialStage, kind: ParameterKind) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .get(&stage)
            .into_iter()
            .flatten()
            .filter(move |p| p.kind() == kind)
    }

    pub fn parameters_mut(&mut self, stage: MaterialStage, kind: ParameterKind) -> impl Iterator<Item = &mut Parameter> {
        self.parameters
            .get_mut(&stage)
            .into_iter()
            .flatten()
            .filter(move |p| p.kind() == kind)
    }

    /// Whole parameter table
    pub fn parameter_table(&self) -> &ParameterTable {
        &self.parameters
    }

    /// Stages that declare at least one parameter
    pub fn stages(&self) -> impl Iterator<Item = MaterialStage> + '_ {
        self.parameters.keys().copied()
    }

    pub fn scalar_count(&self, stage: MaterialStage) -> u32 {
        self.parameters(stage, ParameterKind::Scalar).count() as u32
    }

    pub fn vector_count(&self, stage: MaterialStage) -> u32 {
        self.parameters(stage, ParameterKind::Vector).count() as u32
    }

    pub fn texture_count(&self, stage: MaterialStage) -> u32 {
        self.parameters(stage, ParameterKind::Texture).count() as u32
    }

    /// Dummy floats appended after the scalars so vectors start 16-byte aligned
    pub fn scalar_padding_size(&self, stage: MaterialStage) -> u32 {
        let remainder = self.scalar_count(stage) % ELEMENT_ALIGNMENT;
        (ELEMENT_ALIGNMENT - remainder) % ELEMENT_ALIGNMENT
    }

    /// Clear every `modified` flag
    pub fn mark_all_submitted(&mut self) {
        for parameter in self.parameters.values_mut().flatten() {
            parameter.modified = false;
        }
    }

    /// Flag every parameter for upload, e.g. after values were replaced wholesale
    pub fn mark_all_modified(&mut self) {
        for parameter in self.parameters.values_mut().flatten() {
            parameter.modified = true;
        }
    }

    // ===== COMPUTE TASK =====

    pub fn has_compute_task(&self) -> bool {
        self.compute_task.is_some()
    }

    /// True if the material has a compute task that replaces the graphics pipeline
    pub fn is_compute_only(&self) -> bool {
        self.compute_task.as_ref().is_some_and(ComputeTask::is_compute_only)
    }

    pub fn compute_task(&self) -> Option<&ComputeTask> {
        self.compute_task.as_ref()
    }

    pub fn compute_task_mut(&mut self) -> Option<&mut ComputeTask> {
        self.compute_task.as_mut()
    }

    /// Compute task, created on first use
    pub fn init_compute_task(&mut self) -> &mut ComputeTask {
        self.compute_task.get_or_insert_with(ComputeTask::new)
    }

    pub fn remove_compute_task(&mut self) {
        self.compute_task = None;
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
