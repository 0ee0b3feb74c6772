//! Unit tests for struct_layout.rs

use crate::material::struct_layout::{AttributeType, StructLayout};
use crate::graphics_device::BufferFormat;

// ============================================================================
// ATTRIBUTE TYPE TESTS
// ============================================================================

#[test]
fn test_attribute_type_from_index() {
    assert_eq!(AttributeType::from_index(0), Some(AttributeType::Float));
    assert_eq!(AttributeType::from_index(3), Some(AttributeType::Float4));
    assert_eq!(AttributeType::from_index(11), Some(AttributeType::UInt4));
    assert_eq!(AttributeType::from_index(12), None);
    assert_eq!(AttributeType::from_index(-1), None);
}

#[test]
fn test_attribute_type_hlsl_names() {
    assert_eq!(AttributeType::Float3.hlsl_type_name(), "float3");
    assert_eq!(AttributeType::Int.hlsl_type_name(), "int");
    assert_eq!(AttributeType::UInt2.hlsl_type_name(), "uint2");
}

#[test]
fn test_attribute_type_buffer_format_size_matches() {
    for index in 0..12 {
        let attribute = AttributeType::from_index(index).unwrap();
        assert_eq!(attribute.buffer_format().size_bytes(), attribute.byte_size());
    }
}

// ============================================================================
// LAYOUT TESTS
// ============================================================================

#[test]
fn test_empty_layout_has_zero_size() {
    let layout = StructLayout::new();
    assert!(layout.is_empty());
    assert_eq!(layout.byte_size(), 0);
}

#[test]
fn test_scalars_pack_tightly() {
    let mut layout = StructLayout::new();
    layout.add_attribute(AttributeType::Float, "a");
    layout.add_attribute(AttributeType::UInt, "b");
    layout.add_attribute(AttributeType::Int, "c");

    let offsets: Vec<u32> = layout.members().iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![0, 4, 8]);
    assert_eq!(layout.byte_size(), 12);
}

#[test]
fn test_vector_alignment_and_stride() {
    let mut layout = StructLayout::new();
    layout.add_attribute(AttributeType::Float, "life");
    layout.add_attribute(AttributeType::Float3, "position");
    layout.add_attribute(AttributeType::Float2, "uv");

    let offsets: Vec<u32> = layout.members().iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![0, 16, 32]);
    // 40 bytes rounded up to the 16-byte alignment of float3
    assert_eq!(layout.byte_size(), 48);
}

#[test]
fn test_duplicate_attribute_is_ignored() {
    let mut layout = StructLayout::new();
    assert!(layout.add_attribute(AttributeType::Float4, "position"));
    assert!(!layout.add_attribute(AttributeType::Float, "position"));
    assert_eq!(layout.members().len(), 1);
}

#[test]
fn test_vertex_layout_uses_member_offsets() {
    let mut layout = StructLayout::new();
    layout.add_attribute(AttributeType::Float3, "position");
    layout.add_attribute(AttributeType::Float4, "color");

    let vertex_layout = layout.vertex_layout();
    assert_eq!(vertex_layout.stride, 32);
    assert_eq!(vertex_layout.attributes.len(), 2);
    assert_eq!(vertex_layout.attributes[0].location, 0);
    assert_eq!(vertex_layout.attributes[0].format, BufferFormat::R32G32B32_SFLOAT);
    assert_eq!(vertex_layout.attributes[1].location, 1);
    assert_eq!(vertex_layout.attributes[1].offset, 16);
}
