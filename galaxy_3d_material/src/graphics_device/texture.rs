/// Texture trait and texture asset description
///
/// Textures are never decoded here: the device (or its loader) resolves a
/// `TextureAssetInfo` into a sampled GPU texture.

use serde::Deserialize;

/// Texture pixel format
///
/// Discriminants are the integer values used in material files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    Undefined = 0,
    R8G8B8A8_UNORM = 1,
    R8G8B8A8_UINT = 2,
    R8_UNORM = 3,
    R32_SFLOAT = 4,
    R32_UINT = 5,
    R16G16B16A16_SFLOAT = 6,
    R32G32B32A32_SFLOAT = 7,
    D32_FLOAT = 8,
}

impl TextureFormat {
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => TextureFormat::Undefined,
            1 => TextureFormat::R8G8B8A8_UNORM,
            2 => TextureFormat::R8G8B8A8_UINT,
            3 => TextureFormat::R8_UNORM,
            4 => TextureFormat::R32_SFLOAT,
            5 => TextureFormat::R32_UINT,
            6 => TextureFormat::R16G16B16A16_SFLOAT,
            7 => TextureFormat::R32G32B32A32_SFLOAT,
            8 => TextureFormat::D32_FLOAT,
            _ => return None,
        })
    }

    /// HLSL template argument for `Texture2D<T>`
    pub fn hlsl_pixel_type(&self) -> &'static str {
        match self {
            TextureFormat::R8G8B8A8_UINT => "uint4",
            TextureFormat::R32_UINT => "uint",
            TextureFormat::R8_UNORM | TextureFormat::R32_SFLOAT | TextureFormat::D32_FLOAT => "float",
            TextureFormat::Undefined
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::R16G16B16A16_SFLOAT
            | TextureFormat::R32G32B32A32_SFLOAT => "float4",
        }
    }
}

/// Color space used to interpret texture data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ColorSpace {
    Undefined = 0,
    Linear = 1,
    SRGB = 2,
}

impl ColorSpace {
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => ColorSpace::Undefined,
            1 => ColorSpace::Linear,
            2 => ColorSpace::SRGB,
            _ => return None,
        })
    }
}

/// Identity of a texture asset: format, color space and source path
///
/// Shared texture pools key their cache on this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct TextureAssetInfo {
    pub format: TextureFormat,
    #[serde(rename = "colorSpace")]
    pub color_space: ColorSpace,
    pub path: String,
}

impl TextureAssetInfo {
    pub fn new(format: TextureFormat, color_space: ColorSpace, path: impl Into<String>) -> Self {
        Self { format, color_space, path: path.into() }
    }
}

impl Default for TextureAssetInfo {
    fn default() -> Self {
        Self {
            format: TextureFormat::R8G8B8A8_UNORM,
            color_space: ColorSpace::SRGB,
            path: String::new(),
        }
    }
}

/// Texture resource trait
///
/// Implemented by backend-specific texture types.
pub trait Texture: Send + Sync {
    /// Asset the texture was created from
    fn info(&self) -> &TextureAssetInfo;
}
