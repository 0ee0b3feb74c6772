/// Material system configuration
///
/// Every field has a default, so a JSON config only needs the values it
/// changes. Enum fields use their variant names (`"SRGB"`, `"R8G8B8A8_UNORM"`).

use serde::Deserialize;
use crate::error::{Error, Result};
use crate::graphics_device::{ColorSpace, TextureAssetInfo, TextureFormat};

/// Name under which the error material and its instance are registered
pub const ERROR_MATERIAL_NAME: &str = "__ERROR__";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialConfig {
    /// Number of frame-in-flight slots (F); per-frame state is replicated F times
    pub max_frames_in_flight: usize,
    /// Texture used when a material texture has an empty path
    pub default_texture: TextureAssetInfo,
    /// Global ambient texture (global set, binding 1)
    pub ambient_texture: TextureAssetInfo,
    /// Global shadow map (global set, binding 2)
    pub shadow_map_texture: TextureAssetInfo,
    pub error_material_name: String,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: 2,
            default_texture: TextureAssetInfo::new(
                TextureFormat::R8G8B8A8_UNORM,
                ColorSpace::SRGB,
                "textures/default.png",
            ),
            ambient_texture: TextureAssetInfo::new(
                TextureFormat::R8G8B8A8_UNORM,
                ColorSpace::SRGB,
                "textures/ambient.png",
            ),
            shadow_map_texture: TextureAssetInfo::new(
                TextureFormat::D32_FLOAT,
                ColorSpace::Linear,
                "textures/shadow_map.png",
            ),
            error_material_name: ERROR_MATERIAL_NAME.to_string(),
        }
    }
}

impl MaterialConfig {
    /// Parse a JSON config, filling missing fields with defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: MaterialConfig = serde_json::from_str(text)
            .map_err(|err| Error::InitializationFailed(format!("Invalid material config: {}", err)))?;
        if config.max_frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "maxFramesInFlight must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
