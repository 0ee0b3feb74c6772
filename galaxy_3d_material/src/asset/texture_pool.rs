/// Shared texture pool
///
/// Material resources never create textures themselves: they ask the pool
/// for the texture identified by (format, color space, path), so every
/// material referencing the same file shares one GPU texture.

use std::sync::{Arc, Weak};
use rustc_hash::FxHashMap;
use crate::engine_debug;
use crate::error::Result;
use crate::graphics_device::{Texture, TextureAssetInfo};

/// Source of shared textures
pub trait TexturePool: Send + Sync {
    /// Get the texture for `info`, loading it on first use
    fn texture(&mut self, info: &TextureAssetInfo) -> Result<Arc<dyn Texture>>;
}

/// Loader invoked by `SharedTexturePool` on a cache miss
pub type TextureLoader = Box<dyn FnMut(&TextureAssetInfo) -> Result<Arc<dyn Texture>> + Send + Sync>;

/// Texture pool keeping weak references to loaded textures
///
/// A texture stays cached while at least one material resource holds it.
pub struct SharedTexturePool {
    loader: TextureLoader,
    textures: FxHashMap<TextureAssetInfo, Weak<dyn Texture>>,
}

impl SharedTexturePool {
    pub fn new(loader: TextureLoader) -> Self {
        Self {
            loader,
            textures: FxHashMap::default(),
        }
    }

    /// Number of textures still alive in the cache
    pub fn live_count(&self) -> usize {
        self.textures.values().filter(|weak| weak.strong_count() > 0).count()
    }

    /// Forget entries whose textures were dropped
    pub fn purge(&mut self) {
        self.textures.retain(|_, weak| weak.strong_count() > 0);
    }
}

impl TexturePool for SharedTexturePool {
    fn texture(&mut self, info: &TextureAssetInfo) -> Result<Arc<dyn Texture>> {
        if let Some(texture) = self.textures.get(info).and_then(Weak::upgrade) {
            return Ok(texture);
        }
        let texture = (self.loader)(info)?;
        engine_debug!("galaxy3d::SharedTexturePool", "Loaded texture '{}'", info.path);
        self.textures.insert(info.clone(), Arc::downgrade(&texture));
        Ok(texture)
    }
}

#[cfg(test)]
#[path = "texture_pool_tests.rs"]
mod tests;
