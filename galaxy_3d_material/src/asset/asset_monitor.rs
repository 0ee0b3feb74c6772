/// Asset change monitoring contract
///
/// The monitor watches registered paths (on its own thread, typically) and
/// invokes the callback installed for the asset type when a file changes.
/// Each registration carries a tag map that the callback may rewrite, e.g.
/// when a material file renames the material it declares.

use std::sync::Arc;
use std::time::SystemTime;
use rustc_hash::FxHashMap;
use crate::{engine_error, engine_trace};

/// Kind of asset a path was registered as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Material,
    MaterialInstance,
    Shader,
}

/// Tag map attached to a monitored path
pub type TagInfos = FxHashMap<String, String>;

/// Tag key holding the material name a path belongs to
pub const TAG_MATERIAL_NAME: &str = "materialName";

/// Tag key holding the material instance name a path belongs to
pub const TAG_MATERIAL_INSTANCE_NAME: &str = "materialInstanceName";

/// Callback invoked with the modified path and its mutable tags
///
/// The monitor must not hold any of its own locks while calling it, since
/// the callback may register or unregister paths.
pub type ModifiedCallback = Arc<dyn Fn(&str, &mut TagInfos) + Send + Sync>;

/// Asset monitor trait
pub trait AssetMonitor: Send + Sync {
    /// Start watching `path`; re-registering replaces its tags
    fn register_asset(&mut self, asset_type: AssetType, path: &str, tags: TagInfos);

    /// Stop watching `path`
    fn unregister_asset(&mut self, asset_type: AssetType, path: &str);

    /// Install the callback for one asset type
    fn set_modified_callback(&mut self, asset_type: AssetType, callback: ModifiedCallback);
}

// ============================================================================
// PollingAssetMonitor
// ============================================================================

struct MonitoredAsset {
    asset_type: AssetType,
    tags: TagInfos,
    last_modified: Option<SystemTime>,
}

/// Asset monitor comparing file modification times on each `poll`
///
/// Share it as `Arc<Mutex<PollingAssetMonitor>>` and call
/// `PollingAssetMonitor::poll` from the monitoring thread.
#[derive(Default)]
pub struct PollingAssetMonitor {
    assets: FxHashMap<String, MonitoredAsset>,
    callbacks: FxHashMap<AssetType, ModifiedCallback>,
    forced: Vec<String>,
}

impl PollingAssetMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags registered for `path`
    pub fn tags(&self, path: &str) -> Option<&TagInfos> {
        self.assets.get(path).map(|asset| &asset.tags)
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.assets.contains_key(path)
    }

    pub fn registered_count(&self) -> usize {
        self.assets.len()
    }

    /// Report `path` as modified on the next poll regardless of its timestamp
    pub fn notify_modified(&mut self, path: &str) {
        if self.assets.contains_key(path) {
            self.forced.push(path.to_string());
        }
    }

    fn modified_time(path: &str) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
    }

    fn collect_modified(&mut self) -> Vec<(ModifiedCallback, String, TagInfos)> {
        let mut modified: Vec<String> = std::mem::take(&mut self.forced);
        for (path, asset) in self.assets.iter_mut() {
            let current = Self::modified_time(path);
            if current.is_some() && current != asset.last_modified {
                asset.last_modified = current;
                if !modified.contains(path) {
                    modified.push(path.clone());
                }
            }
        }

        modified.into_iter()
            .filter_map(|path| {
                let asset = self.assets.get(&path)?;
                let callback = self.callbacks.get(&asset.asset_type)?.clone();
                Some((callback, path, asset.tags.clone()))
            })
            .collect()
    }

    /// Dispatch callbacks for every modified path
    ///
    /// Returns the number of callbacks invoked. The monitor lock is released
    /// while callbacks run; rewritten tags are stored back afterwards.
    pub fn poll(monitor: &std::sync::Mutex<Self>) -> usize {
        let pending = match monitor.lock() {
            Ok(mut guard) => guard.collect_modified(),
            Err(_) => {
                engine_error!("galaxy3d::PollingAssetMonitor", "Monitor lock poisoned");
                return 0;
            }
        };

        let count = pending.len();
        for (callback, path, mut tags) in pending {
            callback(&path, &mut tags);
            if let Ok(mut guard) = monitor.lock() {
                if let Some(asset) = guard.assets.get_mut(&path) {
                    asset.tags = tags;
                }
            }
        }
        count
    }
}

impl AssetMonitor for PollingAssetMonitor {
    fn register_asset(&mut self, asset_type: AssetType, path: &str, tags: TagInfos) {
        engine_trace!("galaxy3d::PollingAssetMonitor", "Watching {:?} '{}'", asset_type, path);
        self.assets.insert(path.to_string(), MonitoredAsset {
            asset_type,
            tags,
            last_modified: Self::modified_time(path),
        });
    }

    fn unregister_asset(&mut self, _asset_type: AssetType, path: &str) {
        self.assets.remove(path);
        self.forced.retain(|forced| forced != path);
    }

    fn set_modified_callback(&mut self, asset_type: AssetType, callback: ModifiedCallback) {
        self.callbacks.insert(asset_type, callback);
    }
}

#[cfg(test)]
#[path = "asset_monitor_tests.rs"]
mod tests;
