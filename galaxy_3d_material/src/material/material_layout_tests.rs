//! Unit tests for material_layout.rs
//!
//! Uses MockGraphicsDevice to check set layouts, shader generation and
//! pipeline state without a GPU.

use std::sync::Arc;
use slotmap::SlotMap;
use crate::asset::asset_reader::InMemoryAssetReader;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockRenderPass};
use crate::graphics_device::{
    BindingGroupLayout, BindingGroupLayoutDesc, BindingType, BlendMode, ColorSpace, CullMode, Domain,
    GraphicsDevice, TextureAssetInfo, TextureFormat,
};
use crate::material::compute_task::{SsboAccessMode, SsboInfo, SsboInitMode, SsboUsage};
use crate::material::material::Material;
use crate::material::material_layout::{MaterialLayout, MaterialLayoutKey};
use crate::material::stage::MaterialStage;
use crate::material::struct_layout::{AttributeType, StructLayout};

const FRAMES: usize = 2;

fn reader() -> InMemoryAssetReader {
    let reader = InMemoryAssetReader::new();
    reader.insert("water.vs.hlsl", "// water vs\n");
    reader.insert("water.ps.hlsl", "// water ps\n");
    reader.insert("broken.ps.hlsl", "// BROKEN ps\n");
    reader.insert("sim.cs.hlsl", "// sim cs\n");
    reader.insert("init.cs.hlsl", "// init particles\n");
    reader.insert("broken_init.cs.hlsl", "// BROKEN init\n");
    reader
}

fn shared_layouts(device: &mut MockGraphicsDevice) -> (Arc<dyn BindingGroupLayout>, Arc<dyn BindingGroupLayout>) {
    let global = device.create_binding_group_layout(BindingGroupLayoutDesc::default()).unwrap();
    let per_object = device.create_binding_group_layout(BindingGroupLayoutDesc::default()).unwrap();
    (global, per_object)
}

fn water() -> Material {
    let mut material = Material::empty();
    material.set_vertex_shader("water.vs.hlsl");
    material.set_fragment_shader("water.ps.hlsl");
    material.set_texture(
        MaterialStage::Fragment,
        "normal",
        TextureAssetInfo::new(TextureFormat::R8G8B8A8_UNORM, ColorSpace::Linear, "water_n.png"),
    );
    material
}

fn particles(access_mode: SsboAccessMode, init_resource: &str) -> SsboInfo {
    let mut layout = StructLayout::new();
    layout.add_attribute(AttributeType::Float3, "position");
    layout.add_attribute(AttributeType::Float, "life");
    SsboInfo {
        name: "particles".to_string(),
        stage: MaterialStage::ComputeVertex,
        usage: SsboUsage::Vertex,
        access_mode,
        init_mode: if init_resource.is_empty() { SsboInitMode::Zero } else { SsboInitMode::FromResource },
        init_resource: init_resource.to_string(),
        element_layout: layout,
        num_elements: 64,
    }
}

fn compute_material(compute_only: bool, init_resource: &str) -> Material {
    let mut material = water();
    let task = material.init_compute_task();
    task.set_compute_only(compute_only);
    task.set_compute_shader("sim.cs.hlsl");
    task.add_ssbo_info(particles(SsboAccessMode::ReadWrite, init_resource));
    material
}

fn prepared(material: Material, device: &mut MockGraphicsDevice) -> MaterialLayout {
    let (global, per_object) = shared_layouts(device);
    let mut layout = MaterialLayout::new(material, FRAMES);
    layout.update_descriptor_set_layouts(device, &global, &per_object).unwrap();
    layout
}

// ============================================================================
// SET LAYOUT TESTS
// ============================================================================

#[test]
fn test_graphics_material_set_layouts() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    let layout = prepared(water(), &mut device);

    // global, per-object, vertex, fragment, shared
    assert_eq!(layout.raw_layouts().len(), 5);
    assert!(layout.stage_layout(MaterialStage::Compute).is_none());

    let fragment = layout.stage_layout(MaterialStage::Fragment).unwrap().desc().clone();
    assert_eq!(fragment.entries.len(), 2);
    assert_eq!(fragment.entries[0].binding_type, BindingType::UniformBuffer);
    assert_eq!(fragment.entries[1].binding_type, BindingType::CombinedImageSampler);

    let vertex = layout.stage_layout(MaterialStage::Vertex).unwrap().desc().clone();
    assert_eq!(vertex.entries.len(), 1);
}

#[test]
fn test_compute_task_adds_compute_set_layouts() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    let layout = prepared(compute_material(false, ""), &mut device);

    assert_eq!(layout.raw_layouts().len(), 8);
    let compute_vertex = layout.stage_layout(MaterialStage::ComputeVertex).unwrap().desc().clone();
    // uniform + one alias per frame in flight
    assert_eq!(compute_vertex.entries.len(), 1 + FRAMES);
    assert!(compute_vertex.entries[1..].iter().all(|entry| entry.binding_type == BindingType::StorageBuffer));
}

// ============================================================================
// GRAPHICS PIPELINE TESTS
// ============================================================================

#[test]
fn test_update_pipeline_generates_missing_shaders() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    let mut layout = prepared(water(), &mut device);

    layout.update_pipeline(&mut device, &MockRenderPass::default(), &reader()).unwrap();
    assert!(layout.pipeline().is_ok());
    assert!(layout.has_vertex_shader() && layout.has_fragment_shader());

    let record = &device.pipelines[0];
    assert!(!record.compute);
    assert!(record.shader_sources[0].contains("struct VSInput"));
    assert!(record.shader_sources[0].ends_with("// water vs\n"));
    assert!(record.shader_sources[1].contains("normal"));
    assert!(record.shader_sources[1].ends_with("// water ps\n"));
    assert_eq!(record.cull_mode, Some(CullMode::Back));
    assert_eq!(record.blend_mode, Some(BlendMode::Opaque));
    assert_eq!(record.set_count, 5);
    assert_eq!(record.subpass, 0);
}

#[test]
fn test_two_sided_transparent_material_state() {
    let mut material = water();
    material.set_two_sided(true);
    material.set_domain(Domain::Transparency);

    let mut device = MockGraphicsDevice::new(FRAMES);
    let mut layout = prepared(material, &mut device);
    layout.update_pipeline(&mut device, &MockRenderPass::default(), &reader()).unwrap();

    let record = &device.pipelines[0];
    assert_eq!(record.cull_mode, Some(CullMode::None));
    assert_eq!(record.blend_mode, Some(BlendMode::Alpha));
    assert_eq!(record.subpass, 1);
}

#[test]
fn test_vertex_input_from_storage_buffer() {
    let mut material = compute_material(false, "");
    assert!(material.compute_task_mut().unwrap().set_vertex_input_ssbo(Some("particles")));
    let expected_stride = material.compute_task().unwrap().ssbo_infos()[0].element_layout.byte_size();

    let mut device = MockGraphicsDevice::new(FRAMES);
    let mut layout = prepared(material, &mut device);
    layout.update_pipeline(&mut device, &MockRenderPass::default(), &reader()).unwrap();

    let vertex_layout = device.pipelines[0].vertex_layout.clone().unwrap();
    assert_eq!(vertex_layout.stride, expected_stride);
    assert_eq!(vertex_layout.attributes.len(), 2);
}

#[test]
fn test_shader_failure_then_error_shaders() {
    let mut material = water();
    material.set_fragment_shader("broken.ps.hlsl");

    let mut device = MockGraphicsDevice::new(FRAMES);
    device.shader_fail_marker = Some("BROKEN".to_string());
    let mut layout = prepared(material, &mut device);
    let render_pass = MockRenderPass::default();
    let reader = reader();

    let result = layout.update_pipeline(&mut device, &render_pass, &reader);
    assert!(matches!(result, Err(Error::ShaderCompilation(_))));
    assert!(matches!(layout.pipeline(), Err(Error::InvalidState(_))));

    layout.apply_error_shaders(&mut device, &render_pass, &reader).unwrap();
    layout.update_pipeline(&mut device, &render_pass, &reader).unwrap();
    assert!(layout.pipeline().is_ok());

    let fragment = &device.pipelines.last().unwrap().shader_sources[1];
    assert!(fragment.contains("checker"));
    // Error shaders still see this material's bindings
    assert!(fragment.contains("normal"));
}

#[test]
fn test_set_material_bumps_generation_and_drops_shaders() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    let mut layout = prepared(water(), &mut device);
    layout.update_pipeline(&mut device, &MockRenderPass::default(), &reader()).unwrap();

    let mut keys: SlotMap<MaterialLayoutKey, ()> = SlotMap::with_key();
    let key = keys.insert(());
    let before = layout.handle(key);

    layout.set_material(Material::default_material());
    assert!(!layout.has_vertex_shader());
    assert_ne!(layout.handle(key), before);
    assert_eq!(layout.generation(), before.generation + 1);
}

// ============================================================================
// COMPUTE PIPELINE TESTS
// ============================================================================

#[test]
fn test_compute_only_material_has_no_graphics_pipeline() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    let mut layout = prepared(compute_material(true, ""), &mut device);
    let reader = reader();

    layout.update_pipeline(&mut device, &MockRenderPass::default(), &reader).unwrap();
    assert!(matches!(layout.pipeline(), Err(Error::InvalidState(_))));

    layout.update_compute_pipeline(&mut device, &reader).unwrap();
    assert!(layout.compute_pipeline().is_ok());
    assert_eq!(device.pipelines.len(), 1);
    assert!(device.pipelines[0].compute);
    assert!(device.pipelines[0].shader_sources[0].contains("particlesOut"));
    assert!(layout.ssbo_init_pipelines().unwrap().is_empty());
}

#[test]
fn test_compute_accessors_without_task_are_invalid_state() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    let mut layout = prepared(water(), &mut device);
    layout.update_compute_pipeline(&mut device, &reader()).unwrap();

    assert!(matches!(layout.compute_pipeline(), Err(Error::InvalidState(_))));
    assert!(matches!(layout.ssbo_init_pipelines(), Err(Error::InvalidState(_))));
    assert!(device.pipelines.is_empty());
}

#[test]
fn test_ssbo_init_pipelines_and_trigger() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    let mut layout = prepared(compute_material(true, "init.cs.hlsl"), &mut device);
    layout.update_compute_pipeline(&mut device, &reader()).unwrap();

    let init = layout.ssbo_init_pipelines().unwrap();
    assert_eq!(init.len(), 1);
    assert_eq!(init[0].ssbo_name, "particles");
    let source = &device.pipelines[1].shader_sources[0];
    assert!(source.contains("particlesOut"));
    assert!(source.ends_with("// init particles\n"));

    // Every frame slot initializes once
    assert!(layout.should_init_ssbos_trigger(0));
    assert!(!layout.should_init_ssbos_trigger(0));
    assert!(layout.should_init_ssbos_trigger(1));
    assert!(!layout.should_init_ssbos_trigger(FRAMES + 3));
}

#[test]
fn test_init_shader_failure_disables_init_for_all_frames() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    device.shader_fail_marker = Some("BROKEN".to_string());
    let mut layout = prepared(compute_material(true, "broken_init.cs.hlsl"), &mut device);
    layout.update_compute_pipeline(&mut device, &reader()).unwrap();

    assert!(layout.compute_pipeline().is_ok());
    assert!(layout.ssbo_init_pipelines().unwrap().is_empty());
    for frame_index in 0..FRAMES {
        assert!(!layout.should_init_ssbos_trigger(frame_index));
    }
}

#[test]
fn test_missing_init_resource_disables_init() {
    let mut device = MockGraphicsDevice::new(FRAMES);
    let mut layout = prepared(compute_material(true, "absent.cs.hlsl"), &mut device);
    layout.update_compute_pipeline(&mut device, &reader()).unwrap();

    assert!(layout.ssbo_init_pipelines().unwrap().is_empty());
    assert!(!layout.should_init_ssbos_trigger(0));
}
