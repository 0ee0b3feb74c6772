/// Asset layer: material files, shader synthesis, textures and hot reload

pub mod asset_reader;
pub mod asset_monitor;
pub mod texture_pool;
pub mod shader_declaration;
pub mod material_asset;
pub mod material_instance_asset;

pub use asset_reader::{
    AssetReader, FileAssetReader, InMemoryAssetReader, read_asset_text, builtin_shader_source,
    BUILTIN_PREFIX, DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER, ERROR_VERTEX_SHADER, ERROR_FRAGMENT_SHADER,
};
pub use asset_monitor::{
    AssetMonitor, AssetType, PollingAssetMonitor, ModifiedCallback, TagInfos,
    TAG_MATERIAL_NAME, TAG_MATERIAL_INSTANCE_NAME,
};
pub use texture_pool::{TexturePool, SharedTexturePool, TextureLoader};
pub use shader_declaration::{build_shader_declarations, ShaderDeclarations};
pub use material_asset::MaterialAsset;
pub use material_instance_asset::MaterialInstanceAsset;
