//! Unit tests for texture_pool.rs

use std::sync::{Arc, Mutex};
use crate::asset::texture_pool::{SharedTexturePool, TexturePool};
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::MockTexture;
use crate::graphics_device::{ColorSpace, Texture, TextureAssetInfo, TextureFormat};

fn info(path: &str) -> TextureAssetInfo {
    TextureAssetInfo::new(TextureFormat::R8G8B8A8_UNORM, ColorSpace::SRGB, path)
}

fn counting_pool() -> (SharedTexturePool, Arc<Mutex<usize>>) {
    let loads = Arc::new(Mutex::new(0usize));
    let counter = loads.clone();
    let pool = SharedTexturePool::new(Box::new(move |info: &TextureAssetInfo| {
        if info.path.is_empty() {
            return Err(Error::InvalidResource("empty texture path".to_string()));
        }
        *counter.lock().unwrap() += 1;
        Ok(Arc::new(MockTexture::new(info.clone())) as Arc<dyn Texture>)
    }));
    (pool, loads)
}

#[test]
fn test_same_info_shares_one_texture() {
    let (mut pool, loads) = counting_pool();
    let first = pool.texture(&info("rock.png")).unwrap();
    let second = pool.texture(&info("rock.png")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*loads.lock().unwrap(), 1);
    assert_eq!(pool.live_count(), 1);
}

#[test]
fn test_color_space_is_part_of_the_key() {
    let (mut pool, loads) = counting_pool();
    let srgb = pool.texture(&info("rock.png")).unwrap();
    let linear = pool
        .texture(&TextureAssetInfo::new(TextureFormat::R8G8B8A8_UNORM, ColorSpace::Linear, "rock.png"))
        .unwrap();

    assert!(!Arc::ptr_eq(&srgb, &linear));
    assert_eq!(*loads.lock().unwrap(), 2);
}

#[test]
fn test_dropped_textures_are_reloaded() {
    let (mut pool, loads) = counting_pool();
    drop(pool.texture(&info("rock.png")).unwrap());
    assert_eq!(pool.live_count(), 0);

    pool.purge();
    let _again = pool.texture(&info("rock.png")).unwrap();
    assert_eq!(*loads.lock().unwrap(), 2);
}

#[test]
fn test_loader_errors_propagate() {
    let (mut pool, _) = counting_pool();
    assert!(matches!(pool.texture(&info("")), Err(Error::InvalidResource(_))));
}
