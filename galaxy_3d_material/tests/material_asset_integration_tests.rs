//! Integration tests for material files, instance files and shader synthesis
//!
//! These tests go through the public galaxy3d namespace and the file system.
//! No GPU required.
//!
//! Run with: cargo test --test material_asset_integration_tests

use galaxy_3d_material::galaxy3d::asset::{
    read_asset_text, AssetMonitor, AssetType, FileAssetReader, InMemoryAssetReader, MaterialAsset,
    MaterialInstanceAsset, PollingAssetMonitor, TagInfos, ERROR_FRAGMENT_SHADER,
};
use galaxy_3d_material::galaxy3d::graphics_device::ShaderStage;
use galaxy_3d_material::galaxy3d::material::{MaterialHandle, MaterialInstance};
use galaxy_3d_material::galaxy3d::{Error, MaterialConfig, MaterialStage};
use galaxy_3d_material::glam::Vec4;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const LAVA_MAT: &str = r#"{
    "name": "lava",
    "vertexShaderPath": "lava.vs.hlsl",
    "fragmentShaderPath": "lava.ps.hlsl",
    "scalars": [ { "name": "heat", "stage": 3, "value": 0.5 } ],
    "vectors": [ { "name": "glow", "stage": 3, "value": [1.0, 0.4, 0.0, 1.0] } ],
    "textures": [ { "name": "crust", "stage": 3, "value": { "path": "lava.png", "format": 1, "colorSpace": 1 } } ]
}"#;

const COOLED_MATINST: &str = r#"{
    "name": "cooled",
    "parentMaterialName": "lava",
    "scalars": [ { "name": "heat", "stage": 3, "value": 0.1 } ]
}"#;

/// Fresh directory under the system temp dir holding the lava material files
fn write_lava_files(test_name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("galaxy3d_{}_{}", test_name, std::process::id()));
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("lava.mat"), LAVA_MAT).unwrap();
    std::fs::write(root.join("cooled.matinst"), COOLED_MATINST).unwrap();
    std::fs::write(root.join("lava.vs.hlsl"), "// lava vs\n").unwrap();
    std::fs::write(root.join("lava.ps.hlsl"), "// lava ps\n").unwrap();
    root
}

// ============================================================================
// FILE LOADING TESTS
// ============================================================================

#[test]
fn test_integration_load_material_from_disk() {
    let root = write_lava_files("load");
    let reader = FileAssetReader::with_root(&root);

    let asset = MaterialAsset::load("lava.mat", &reader, 2).unwrap();
    assert_eq!(asset.name(), "lava");
    let material = asset.material();
    assert_eq!(material.scalar(MaterialStage::Fragment, "heat"), Some(0.5));
    assert_eq!(material.vector(MaterialStage::Fragment, "glow"), Some(Vec4::new(1.0, 0.4, 0.0, 1.0)));
    assert_eq!(material.texture(MaterialStage::Fragment, "crust").unwrap().path, "lava.png");

    let fragment = asset.generate_shader_code(ShaderStage::Fragment, None).unwrap();
    assert!(fragment.contains("heat"));
    assert!(fragment.contains("crust"));
    assert!(fragment.ends_with("// lava ps\n"));

    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_integration_missing_file_is_asset_error() {
    let reader = FileAssetReader::with_root(std::env::temp_dir().join("galaxy3d_does_not_exist"));
    assert!(matches!(MaterialAsset::load("nothing.mat", &reader, 2), Err(Error::AssetError(_))));
    assert!(matches!(MaterialInstanceAsset::load("nothing.matinst", &reader), Err(Error::AssetError(_))));
}

#[test]
fn test_integration_instance_overrides_parent() {
    let root = write_lava_files("instance");
    let reader = FileAssetReader::with_root(&root);

    let parent = MaterialAsset::load("lava.mat", &reader, 2).unwrap().into_material();
    let asset = MaterialInstanceAsset::load("cooled.matinst", &reader).unwrap();
    assert_eq!(asset.parent_material_name(), "lava");

    let mut instance = MaterialInstance::new(&parent, MaterialHandle::detached());
    asset.fill(&mut instance);
    assert_eq!(instance.scalar(MaterialStage::Fragment, "heat"), Some(0.1));
    assert_eq!(instance.vector(MaterialStage::Fragment, "glow"), Some(Vec4::new(1.0, 0.4, 0.0, 1.0)));

    instance.reset();
    assert_eq!(instance.scalar(MaterialStage::Fragment, "heat"), Some(0.5));

    std::fs::remove_dir_all(root).ok();
}

// ============================================================================
// BUILT-IN SHADER TESTS
// ============================================================================

#[test]
fn test_integration_builtin_shaders_need_no_files() {
    let reader = InMemoryAssetReader::new();
    assert!(read_asset_text(&reader, ERROR_FRAGMENT_SHADER).unwrap().contains("checker"));
    assert!(read_asset_text(&reader, "builtin://unknown.hlsl").is_err());

    let asset = MaterialAsset::from_json_str(r#"{ "name": "plain" }"#, &reader, 2).unwrap();
    // No shader paths: nothing to generate
    assert!(asset.generate_shader_code(ShaderStage::Vertex, None).is_err());
}

// ============================================================================
// CONFIG / MONITOR TESTS
// ============================================================================

#[test]
fn test_integration_config_from_json() {
    let config = MaterialConfig::from_json_str(r#"{ "maxFramesInFlight": 3 }"#).unwrap();
    assert_eq!(config.max_frames_in_flight, 3);
    assert!(MaterialConfig::from_json_str(r#"{ "maxFramesInFlight": 0 }"#).is_err());
}

#[test]
fn test_integration_polling_monitor_dispatches_by_type() {
    let monitor = Arc::new(Mutex::new(PollingAssetMonitor::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));

    {
        let mut guard = monitor.lock().unwrap();
        let sink = seen.clone();
        guard.set_modified_callback(AssetType::Shader, Arc::new(move |path: &str, tags: &mut TagInfos| {
            sink.lock().unwrap().push(path.to_string());
            tags.insert("seen".to_string(), "yes".to_string());
        }));
        guard.register_asset(AssetType::Shader, "virtual/a.ps.hlsl", TagInfos::default());
        guard.register_asset(AssetType::Material, "virtual/a.mat", TagInfos::default());
        guard.notify_modified("virtual/a.ps.hlsl");
        guard.notify_modified("virtual/a.mat");
        guard.notify_modified("virtual/unregistered.mat");
    }

    // Materials have no callback installed
    assert_eq!(PollingAssetMonitor::poll(&monitor), 1);
    assert_eq!(*seen.lock().unwrap(), vec!["virtual/a.ps.hlsl".to_string()]);
    assert_eq!(monitor.lock().unwrap().tags("virtual/a.ps.hlsl").unwrap()["seen"], "yes");
    assert_eq!(PollingAssetMonitor::poll(&monitor), 0);
}
