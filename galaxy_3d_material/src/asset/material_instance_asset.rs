/// MaterialInstanceAsset - material instance files
///
/// ```text
/// {
///     "name": "water_murky",
///     "parentMaterialName": "water",
///     "scalars":  [ { "name": "roughness", "stage": 3, "value": 0.6 } ],
///     "textures": [ { "name": "normal", "stage": 3, "value": { "path": "murky_n.png" } } ]
/// }
/// ```
///
/// Overrides only apply to parameters the parent declares. A texture
/// override without `format` or `colorSpace` keeps the parent's value.

use serde_json::Value;
use crate::asset::asset_reader::{read_asset_text, AssetReader};
use crate::asset::material_asset::{array_field, int_field, parameter_head, str_field, vector_value};
use crate::engine_debug;
use crate::error::{Error, Result};
use crate::graphics_device::{ColorSpace, TextureAssetInfo, TextureFormat};
use crate::material::material_instance::MaterialInstance;

#[derive(Debug, Clone)]
pub struct MaterialInstanceAsset {
    data: Value,
}

impl MaterialInstanceAsset {
    /// Load a material instance file
    ///
    /// # Errors
    ///
    /// Returns `Error::AssetError` if the file cannot be read or is not valid JSON.
    pub fn load(path: &str, reader: &dyn AssetReader) -> Result<Self> {
        let text = read_asset_text(reader, path)?;
        Self::from_json_str(&text).map_err(|err| Error::AssetError(format!("{}: {}", path, err)))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let data = serde_json::from_str(text)
            .map_err(|err| Error::AssetError(format!("Failed to parse material instance JSON: {}", err)))?;
        Ok(Self { data })
    }

    /// Instance name (empty if absent)
    pub fn name(&self) -> &str {
        str_field(&self.data, "name").unwrap_or_default()
    }

    /// Name of the parent material (empty if absent)
    pub fn parent_material_name(&self) -> &str {
        str_field(&self.data, "parentMaterialName").unwrap_or_default()
    }

    /// Apply the file's overrides to `instance`
    pub fn fill(&self, instance: &mut MaterialInstance) {
        for entry in array_field(&self.data, "scalars") {
            let value = entry.get("value").and_then(Value::as_f64);
            if let (Some((stage, name)), Some(value)) = (parameter_head(entry), value) {
                if !instance.set_scalar(stage, name, value as f32) {
                    engine_debug!("galaxy3d::MaterialInstanceAsset", "Parent has no scalar '{}'", name);
                }
            }
        }

        for entry in array_field(&self.data, "vectors") {
            if let (Some((stage, name)), Some(value)) = (parameter_head(entry), vector_value(entry)) {
                if !instance.set_vector(stage, name, value) {
                    engine_debug!("galaxy3d::MaterialInstanceAsset", "Parent has no vector '{}'", name);
                }
            }
        }

        for entry in array_field(&self.data, "textures") {
            let Some((stage, name)) = parameter_head(entry) else {
                continue;
            };
            let Some(value) = entry.get("value").filter(|value| value.is_object()) else {
                continue;
            };
            let Some(path) = str_field(value, "path") else {
                continue;
            };
            let format = int_field(value, "format")
                .and_then(TextureFormat::from_index)
                .unwrap_or(TextureFormat::Undefined);
            let color_space = int_field(value, "colorSpace")
                .and_then(ColorSpace::from_index)
                .unwrap_or(ColorSpace::Undefined);
            if !instance.set_texture(stage, name, TextureAssetInfo::new(format, color_space, path)) {
                engine_debug!("galaxy3d::MaterialInstanceAsset", "Parent has no texture '{}'", name);
            }
        }
    }
}

#[cfg(test)]
#[path = "material_instance_asset_tests.rs"]
mod tests;
