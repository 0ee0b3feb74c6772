/// MaterialAsset - material file loading and shader source generation
///
/// A material file is JSON. Parsing is lenient: a malformed entry is
/// skipped and the rest of the file still applies. Only an unreadable or
/// unparsable file fails the load.
///
/// ```text
/// {
///     "name": "water",
///     "vertexShaderPath": "shaders/water.vs.hlsl",
///     "fragmentShaderPath": "shaders/water.ps.hlsl",
///     "domain": 1, "topology": 3, "vertexType": 0, "twoSided": true,
///     "scalars":  [ { "name": "roughness", "stage": 3, "value": 0.2 } ],
///     "vectors":  [ { "name": "tint", "stage": 2, "value": [0.1, 0.4, 0.8, 1.0] } ],
///     "textures": [ { "name": "normal", "stage": 3,
///                     "value": { "path": "water_n.png", "format": 1, "colorSpace": 1 } } ],
///     "computeTask": {
///         "computeOnly": false,
///         "computeShaderPath": "shaders/waves.cs.hlsl",
///         "dispatchGroup": [64, 1, 1],
///         "dispatchFrequency": 1,
///         "vertexInputSSBO": "waves",
///         "ssboInfos": [ { "name": "waves", "stage": 6, "usage": 1, "accessMode": 1,
///                          "initMode": 0, "initResource": "", "numElements": 4096,
///                          "elementLayout": [ { "position": 2 }, { "height": 0 } ] } ]
///     }
/// }
/// ```

use std::collections::BTreeMap;
use glam::Vec4;
use serde_json::Value;
use crate::asset::asset_reader::{read_asset_text, AssetReader};
use crate::asset::shader_declaration::{build_shader_declarations, input_attachment_declarations, ShaderDeclarations};
use crate::engine_warn;
use crate::error::{Error, Result};
use crate::graphics_device::{
    ColorSpace, Domain, InputAttachmentInfo, PrimitiveTopology, ShaderStage, TextureAssetInfo, TextureFormat,
};
use crate::material::compute_task::{SsboAccessMode, SsboInfo, SsboInitMode, SsboUsage};
use crate::material::material::Material;
use crate::material::stage::MaterialStage;
use crate::material::struct_layout::{AttributeType, StructLayout};
use crate::material::vertex_type::VertexType;

const LOG_SOURCE: &str = "galaxy3d::MaterialAsset";

/// A material together with its generated declarations and shader bodies
#[derive(Debug, Clone)]
pub struct MaterialAsset {
    name: String,
    material: Material,
    declarations: ShaderDeclarations,
    shader_sources: BTreeMap<ShaderStage, String>,
}

impl MaterialAsset {
    /// Load a material file
    ///
    /// # Errors
    ///
    /// Returns `Error::AssetError` if the file cannot be read or is not valid JSON.
    pub fn load(path: &str, reader: &dyn AssetReader, frames_in_flight: usize) -> Result<Self> {
        let text = read_asset_text(reader, path)?;
        Self::from_json_str(&text, reader, frames_in_flight)
            .map_err(|err| Error::AssetError(format!("{}: {}", path, err)))
    }

    /// Build from material JSON text; shader bodies are read through `reader`
    pub fn from_json_str(text: &str, reader: &dyn AssetReader, frames_in_flight: usize) -> Result<Self> {
        let data: Value = serde_json::from_str(text)
            .map_err(|err| Error::AssetError(format!("Failed to parse material JSON: {}", err)))?;

        let mut material = Material::empty();
        parse_material(&data, &mut material);
        parse_compute_task(&data, &mut material);

        let name = data.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let mut asset = Self::from_material(&material, reader, frames_in_flight);
        asset.name = name;
        Ok(asset)
    }

    /// Generate declarations for an existing material and read its shader bodies
    ///
    /// A shader body that cannot be read is logged and left missing;
    /// `generate_shader_code` then fails for that stage.
    pub fn from_material(material: &Material, reader: &dyn AssetReader, frames_in_flight: usize) -> Self {
        let mut shader_paths = vec![
            (ShaderStage::Vertex, material.vertex_shader_path()),
            (ShaderStage::Fragment, material.fragment_shader_path()),
        ];
        if let Some(task) = material.compute_task() {
            shader_paths.push((ShaderStage::Compute, task.compute_shader_path()));
        }

        let mut shader_sources = BTreeMap::new();
        for (stage, path) in shader_paths {
            if path.is_empty() {
                continue;
            }
            match read_asset_text(reader, path) {
                Ok(source) => {
                    shader_sources.insert(stage, source);
                }
                Err(err) => engine_warn!(LOG_SOURCE, "Shader '{}' unavailable: {}", path, err),
            }
        }

        Self {
            name: String::new(),
            material: material.clone(),
            declarations: build_shader_declarations(material, frames_in_flight),
            shader_sources,
        }
    }

    /// Value of the file's `name` field (empty if absent)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn into_material(self) -> Material {
        self.material
    }

    /// Generated declaration of `stage` (empty if the stage has none)
    pub fn shader_declaration(&self, stage: ShaderStage) -> &str {
        self.declarations.get(&stage).map(String::as_str).unwrap_or_default()
    }

    /// Complete shader source: declaration, input attachments (fragment only), body
    ///
    /// # Errors
    ///
    /// Returns `Error::ShaderCompilation` if the stage has no declaration or no shader body.
    pub fn generate_shader_code(
        &self,
        stage: ShaderStage,
        input_attachments: Option<&[InputAttachmentInfo]>,
    ) -> Result<String> {
        let (Some(declaration), Some(source)) = (self.declarations.get(&stage), self.shader_sources.get(&stage)) else {
            return Err(Error::ShaderCompilation(format!(
                "No shader declaration or source for {:?} stage",
                stage
            )));
        };

        let attachments = match (stage, input_attachments) {
            (ShaderStage::Fragment, Some(infos)) => input_attachment_declarations(self.material.domain(), infos),
            _ => String::new(),
        };
        Ok(format!("{}{}{}", declaration, attachments, source))
    }

    /// Source of an SSBO init shader: compute declaration plus `init_source`
    pub fn generate_init_shader_code(&self, init_source: &str) -> Result<String> {
        let declaration = self.declarations.get(&ShaderStage::Compute).ok_or_else(|| {
            Error::ShaderCompilation("Material has no compute declaration".to_string())
        })?;
        Ok(format!("{}{}", declaration, init_source))
    }
}

// ============================================================================
// Lenient JSON readers
// ============================================================================

pub(crate) fn int_field(data: &Value, key: &str) -> Option<i64> {
    data.get(key).and_then(Value::as_i64)
}

pub(crate) fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

pub(crate) fn array_field<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

/// `name` and `stage` of a parameter entry
pub(crate) fn parameter_head(entry: &Value) -> Option<(MaterialStage, &str)> {
    let name = str_field(entry, "name")?;
    let stage = MaterialStage::from_index(int_field(entry, "stage")?)?;
    Some((stage, name))
}

pub(crate) fn vector_value(entry: &Value) -> Option<Vec4> {
    let value = entry.get("value")?.as_array()?;
    if value.len() < 4 {
        return None;
    }
    let component = |index: usize| value[index].as_f64().map(|v| v as f32);
    Some(Vec4::new(component(0)?, component(1)?, component(2)?, component(3)?))
}

fn parse_material(data: &Value, material: &mut Material) {
    if let Some(path) = str_field(data, "vertexShaderPath") {
        material.set_vertex_shader(path);
    }
    if let Some(path) = str_field(data, "fragmentShaderPath") {
        material.set_fragment_shader(path);
    }
    if let Some(domain) = int_field(data, "domain").and_then(Domain::from_index) {
        material.set_domain(domain);
    }
    if let Some(topology) = int_field(data, "topology").and_then(PrimitiveTopology::from_index) {
        material.set_topology(topology);
    }
    if let Some(vertex_type) = int_field(data, "vertexType").and_then(VertexType::from_index) {
        material.set_vertex_type(vertex_type);
    }
    if let Some(two_sided) = data.get("twoSided").and_then(Value::as_bool) {
        material.set_two_sided(two_sided);
    }

    for entry in array_field(data, "scalars") {
        let value = entry.get("value").and_then(Value::as_f64);
        if let (Some((stage, name)), Some(value)) = (parameter_head(entry), value) {
            material.set_scalar(stage, name, value as f32);
        }
    }

    for entry in array_field(data, "vectors") {
        if let (Some((stage, name)), Some(value)) = (parameter_head(entry), vector_value(entry)) {
            material.set_vector(stage, name, value);
        }
    }

    for entry in array_field(data, "textures") {
        let Some((stage, name)) = parameter_head(entry) else {
            continue;
        };
        let Some(value) = entry.get("value").filter(|value| value.is_object()) else {
            continue;
        };
        let path = str_field(value, "path");
        let format = int_field(value, "format").and_then(TextureFormat::from_index);
        let color_space = int_field(value, "colorSpace").and_then(ColorSpace::from_index);
        if let (Some(path), Some(format), Some(color_space)) = (path, format, color_space) {
            material.set_texture(stage, name, TextureAssetInfo::new(format, color_space, path));
        }
    }
}

fn parse_compute_task(data: &Value, material: &mut Material) {
    let Some(task_data) = data.get("computeTask").filter(|value| value.is_object()) else {
        return;
    };
    let task = material.init_compute_task();

    if let Some(compute_only) = task_data.get("computeOnly").and_then(Value::as_bool) {
        task.set_compute_only(compute_only);
    }
    if let Some(path) = str_field(task_data, "computeShaderPath") {
        task.set_compute_shader(path);
    }
    let group = array_field(task_data, "dispatchGroup");
    if group.len() >= 3 {
        let axis = |index: usize| group[index].as_u64().map(|v| v as u32);
        if let (Some(x), Some(y), Some(z)) = (axis(0), axis(1), axis(2)) {
            task.set_dispatch_group([x, y, z]);
        }
    }
    if let Some(frequency) = task_data.get("dispatchFrequency").and_then(Value::as_u64) {
        task.set_dispatch_frequency(frequency as u32);
    }

    for entry in array_field(task_data, "ssboInfos") {
        if let Some(info) = parse_ssbo_info(entry) {
            task.add_ssbo_info(info);
        }
    }

    // Applied last so the designated SSBO already exists
    if let Some(name) = str_field(task_data, "vertexInputSSBO") {
        if !task.set_vertex_input_ssbo(Some(name)) {
            engine_warn!(LOG_SOURCE, "Vertex input SSBO '{}' is not declared", name);
        }
    }
}

fn parse_ssbo_info(entry: &Value) -> Option<SsboInfo> {
    let mut element_layout = StructLayout::new();
    for attribute in entry.get("elementLayout")?.as_array()? {
        // Each attribute is a single-key object: { attributeName: attributeType }
        let Some((name, attribute_type)) = attribute.as_object().and_then(|object| object.iter().next()) else {
            continue;
        };
        if let Some(attribute_type) = attribute_type.as_i64().and_then(AttributeType::from_index) {
            element_layout.add_attribute(attribute_type, name.as_str());
        }
    }
    if element_layout.byte_size() == 0 {
        return None;
    }

    Some(SsboInfo {
        name: str_field(entry, "name")?.to_string(),
        stage: MaterialStage::from_index(int_field(entry, "stage")?)?,
        usage: SsboUsage::from_index(int_field(entry, "usage")?)?,
        access_mode: SsboAccessMode::from_index(int_field(entry, "accessMode")?)?,
        init_mode: SsboInitMode::from_index(int_field(entry, "initMode")?)?,
        init_resource: str_field(entry, "initResource")?.to_string(),
        element_layout,
        num_elements: entry.get("numElements")?.as_u64()? as u32,
    })
}

#[cfg(test)]
#[path = "material_asset_tests.rs"]
mod tests;
