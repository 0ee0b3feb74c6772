/// Text asset access (material files and shader bodies)
///
/// Paths starting with `builtin://` resolve to shaders compiled into the
/// crate, so the default and error materials never depend on the file system.

use std::path::PathBuf;
use std::sync::RwLock;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};

/// Prefix of paths served from the built-in shader table
pub const BUILTIN_PREFIX: &str = "builtin://";

pub const DEFAULT_VERTEX_SHADER: &str = "builtin://default.vs.hlsl";
pub const DEFAULT_FRAGMENT_SHADER: &str = "builtin://default.ps.hlsl";
pub const ERROR_VERTEX_SHADER: &str = "builtin://error.vs.hlsl";
pub const ERROR_FRAGMENT_SHADER: &str = "builtin://error.ps.hlsl";

const DEFAULT_VERTEX_SOURCE: &str = r#"
struct VSOutput {
	float4 position : SV_POSITION;
	float2 texCoord : TEXCOORD0;
};

VSOutput main(VSInput input) {
	VSOutput output;
	output.position = mul(projection, mul(view, mul(model, float4(input.position, 1.0))));
	output.texCoord = input.texCoord;
	return output;
}
"#;

const DEFAULT_FRAGMENT_SOURCE: &str = r#"
float4 main(float4 position : SV_POSITION, float2 texCoord : TEXCOORD0) : SV_TARGET {
	return float4(texCoord, 0.0, 1.0);
}
"#;

const ERROR_VERTEX_SOURCE: &str = r#"
struct VSOutput {
	float4 position : SV_POSITION;
	float3 worldPosition : TEXCOORD0;
};

VSOutput main(VSInput input) {
	VSOutput output;
	float4 worldPosition = mul(model, float4(input.position, 1.0));
	output.position = mul(projection, mul(view, worldPosition));
	output.worldPosition = worldPosition.xyz;
	return output;
}
"#;

// Magenta/black checkerboard in world space.
const ERROR_FRAGMENT_SOURCE: &str = r#"
float4 main(float4 position : SV_POSITION, float3 worldPosition : TEXCOORD0) : SV_TARGET {
	int3 cell = int3(floor(worldPosition * 4.0));
	float checker = (cell.x + cell.y + cell.z) & 1;
	return lerp(float4(1.0, 0.0, 1.0, 1.0), float4(0.0, 0.0, 0.0, 1.0), checker);
}
"#;

/// Source of a built-in shader, if `path` names one
pub fn builtin_shader_source(path: &str) -> Option<&'static str> {
    match path {
        DEFAULT_VERTEX_SHADER => Some(DEFAULT_VERTEX_SOURCE),
        DEFAULT_FRAGMENT_SHADER => Some(DEFAULT_FRAGMENT_SOURCE),
        ERROR_VERTEX_SHADER => Some(ERROR_VERTEX_SOURCE),
        ERROR_FRAGMENT_SHADER => Some(ERROR_FRAGMENT_SOURCE),
        _ => None,
    }
}

/// Reads text assets by path
pub trait AssetReader: Send + Sync {
    /// Read the whole text file at `path`
    ///
    /// # Errors
    ///
    /// Returns `Error::AssetError` if the file cannot be read.
    fn read_text(&self, path: &str) -> Result<String>;
}

/// Read `path`, serving `builtin://` shaders from memory
pub fn read_asset_text(reader: &dyn AssetReader, path: &str) -> Result<String> {
    if path.starts_with(BUILTIN_PREFIX) {
        return builtin_shader_source(path)
            .map(str::to_string)
            .ok_or_else(|| Error::AssetError(format!("Unknown built-in asset: {}", path)));
    }
    reader.read_text(path)
}

/// Reads assets from the file system, relative to an optional root
#[derive(Debug, Clone, Default)]
pub struct FileAssetReader {
    root: Option<PathBuf>,
}

impl FileAssetReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }
}

impl AssetReader for FileAssetReader {
    fn read_text(&self, path: &str) -> Result<String> {
        let full_path = match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        };
        std::fs::read_to_string(&full_path)
            .map_err(|err| Error::AssetError(format!("Failed to read '{}': {}", full_path.display(), err)))
    }
}

/// Serves assets from an in-memory table (tools, tests, embedded content)
///
/// Entries can be replaced while the reader is shared, which is how hot
/// reload is driven without touching the file system.
#[derive(Debug, Default)]
pub struct InMemoryAssetReader {
    files: RwLock<FxHashMap<String, String>>,
}

impl InMemoryAssetReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), text.into());
        }
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.files.write().ok().and_then(|mut files| files.remove(path))
    }
}

impl AssetReader for InMemoryAssetReader {
    fn read_text(&self, path: &str) -> Result<String> {
        let files = self.files.read()
            .map_err(|_| Error::AssetError("Asset table lock poisoned".to_string()))?;
        files.get(path)
            .cloned()
            .ok_or_else(|| Error::AssetError(format!("No such asset: {}", path)))
    }
}
