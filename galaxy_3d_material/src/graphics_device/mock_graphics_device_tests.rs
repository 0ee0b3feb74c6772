/// Unit tests for MockGraphicsDevice and associated mock types.
///
/// The material tests rely on the mock's frame indexing, id bookkeeping and
/// shader failure injection, so those are pinned down here.

use std::sync::Arc;
use crate::asset::TexturePool;
use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::{
    BufferDesc, BufferUsage, ColorSpace, Domain, FenceFlag, FrameSynchronizer, GraphicsDevice, RenderPassInfo,
    ShaderDesc, ShaderStage, TextureAssetInfo, TextureFormat,
};

fn shader_desc(source: &str) -> ShaderDesc<'_> {
    ShaderDesc { source, stage: ShaderStage::Fragment, entry_point: "main", debug_name: "test.ps.hlsl" }
}

// ============================================================================
// FRAME INDEX TESTS
// ============================================================================

#[test]
fn test_frame_indices_wrap() {
    let mut device = MockGraphicsDevice::new(3);
    assert_eq!(device.current_frame_index(), 0);
    assert_eq!(device.last_frame_index(), 2);

    device.advance_frame();
    assert_eq!(device.current_frame_index(), 1);
    assert_eq!(device.last_frame_index(), 0);

    device.advance_frame();
    device.advance_frame();
    assert_eq!(device.current_frame_index(), 0);
}

#[test]
fn test_single_frame_in_flight() {
    let device = MockGraphicsDevice::new(1);
    assert_eq!(device.current_frame_index(), 0);
    assert_eq!(device.last_frame_index(), 0);
}

// ============================================================================
// BUFFER TESTS
// ============================================================================

#[test]
fn test_buffer_initial_data_and_update() {
    let mut device = MockGraphicsDevice::new(2);
    let data: Vec<u8> = [1.0f32, 2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let buffer = device.create_buffer(BufferDesc { size: 16, usage: BufferUsage::Uniform }, &data).unwrap();

    assert_eq!(buffer.size(), 16);
    assert_eq!(device.buffer_id(&buffer), Some(0));
    assert_eq!(device.buffer(0).unwrap().floats(), vec![1.0, 2.0, 0.0, 0.0]);

    buffer.update(8, &3.0f32.to_le_bytes()).unwrap();
    assert_eq!(device.buffer(0).unwrap().floats()[2], 3.0);
}

#[test]
fn test_buffer_update_out_of_range_fails() {
    let mut device = MockGraphicsDevice::new(2);
    let buffer = device.create_buffer(BufferDesc { size: 4, usage: BufferUsage::Storage }, &[]).unwrap();
    assert!(buffer.update(2, &[0u8; 4]).is_err());
}

// ============================================================================
// SHADER TESTS
// ============================================================================

#[test]
fn test_shader_fail_marker() {
    let mut device = MockGraphicsDevice::new(2);
    device.shader_fail_marker = Some("BROKEN".to_string());

    assert!(device.create_shader(shader_desc("float4 main() : SV_Target { BROKEN }")).is_err());
    assert!(device.create_shader(shader_desc("float4 main() : SV_Target { return 1; }")).is_ok());
    assert_eq!(device.shaders.len(), 1);
}

// ============================================================================
// SHARED / COLLABORATOR TESTS
// ============================================================================

#[test]
fn test_shared_handles_point_to_same_device() {
    let (mock, device) = MockGraphicsDevice::shared(2);
    device.lock().unwrap().create_buffer(BufferDesc { size: 4, usage: BufferUsage::Uniform }, &[]).unwrap();
    assert_eq!(mock.lock().unwrap().buffers.len(), 1);
}

#[test]
fn test_render_pass_subpasses() {
    let render_pass = MockRenderPass::default();
    assert_eq!(render_pass.subpass_index(Domain::Forward), 0);
    assert_eq!(render_pass.subpass_index(Domain::PostProcess), 1);
    assert!(render_pass.input_attachments().is_empty());
}

#[test]
fn test_synchronizer_records_waits() {
    let mut synchronizer = MockSynchronizer::default();
    synchronizer.wait(FenceFlag::ComputeInFlight).unwrap();
    assert_eq!(synchronizer.waits, vec![FenceFlag::ComputeInFlight]);
}

#[test]
fn test_texture_pool_records_requests() {
    let mut pool = MockTexturePool::default();
    let info = TextureAssetInfo::new(TextureFormat::R8G8B8A8_UNORM, ColorSpace::SRGB, "a.png");
    let texture = pool.texture(&info).unwrap();
    assert_eq!(texture.info().path, "a.png");
    assert_eq!(pool.requests, vec![info]);
    assert!(Arc::strong_count(&texture) >= 1);
}
