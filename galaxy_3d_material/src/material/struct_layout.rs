/// Element layout of structured buffers
///
/// Attributes are laid out with std430 rules (the default for HLSL
/// `StructuredBuffer` compiled to SPIR-V): scalars align to 4 bytes,
/// 2-component vectors to 8, 3 and 4-component vectors to 16. The element
/// stride is rounded up to the largest attribute alignment. The same
/// offsets are used when the buffer doubles as vertex input.

use crate::graphics_device::{BufferFormat, VertexAttribute, VertexLayout};

/// Attribute type of a structured buffer element
///
/// Discriminants are the integer values used in material files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Float = 0,
    Float2 = 1,
    Float3 = 2,
    Float4 = 3,
    Int = 4,
    Int2 = 5,
    Int3 = 6,
    Int4 = 7,
    UInt = 8,
    UInt2 = 9,
    UInt3 = 10,
    UInt4 = 11,
}

impl AttributeType {
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => AttributeType::Float,
            1 => AttributeType::Float2,
            2 => AttributeType::Float3,
            3 => AttributeType::Float4,
            4 => AttributeType::Int,
            5 => AttributeType::Int2,
            6 => AttributeType::Int3,
            7 => AttributeType::Int4,
            8 => AttributeType::UInt,
            9 => AttributeType::UInt2,
            10 => AttributeType::UInt3,
            11 => AttributeType::UInt4,
            _ => return None,
        })
    }

    pub fn component_count(self) -> u32 {
        match self {
            AttributeType::Float | AttributeType::Int | AttributeType::UInt => 1,
            AttributeType::Float2 | AttributeType::Int2 | AttributeType::UInt2 => 2,
            AttributeType::Float3 | AttributeType::Int3 | AttributeType::UInt3 => 3,
            AttributeType::Float4 | AttributeType::Int4 | AttributeType::UInt4 => 4,
        }
    }

    pub fn byte_size(self) -> u32 {
        self.component_count() * 4
    }

    /// std430 base alignment
    pub fn alignment(self) -> u32 {
        match self.component_count() {
            1 => 4,
            2 => 8,
            _ => 16,
        }
    }

    pub fn hlsl_type_name(self) -> &'static str {
        match self {
            AttributeType::Float => "float",
            AttributeType::Float2 => "float2",
            AttributeType::Float3 => "float3",
            AttributeType::Float4 => "float4",
            AttributeType::Int => "int",
            AttributeType::Int2 => "int2",
            AttributeType::Int3 => "int3",
            AttributeType::Int4 => "int4",
            AttributeType::UInt => "uint",
            AttributeType::UInt2 => "uint2",
            AttributeType::UInt3 => "uint3",
            AttributeType::UInt4 => "uint4",
        }
    }

    pub fn buffer_format(self) -> BufferFormat {
        match self {
            AttributeType::Float => BufferFormat::R32_SFLOAT,
            AttributeType::Float2 => BufferFormat::R32G32_SFLOAT,
            AttributeType::Float3 => BufferFormat::R32G32B32_SFLOAT,
            AttributeType::Float4 => BufferFormat::R32G32B32A32_SFLOAT,
            AttributeType::Int => BufferFormat::R32_SINT,
            AttributeType::Int2 => BufferFormat::R32G32_SINT,
            AttributeType::Int3 => BufferFormat::R32G32B32_SINT,
            AttributeType::Int4 => BufferFormat::R32G32B32A32_SINT,
            AttributeType::UInt => BufferFormat::R32_UINT,
            AttributeType::UInt2 => BufferFormat::R32G32_UINT,
            AttributeType::UInt3 => BufferFormat::R32G32B32_UINT,
            AttributeType::UInt4 => BufferFormat::R32G32B32A32_UINT,
        }
    }
}

/// One named attribute with its byte offset in the element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMember {
    pub name: String,
    pub attribute_type: AttributeType,
    pub offset: u32,
}

/// Ordered, typed attributes of one buffer element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructLayout {
    members: Vec<AttributeMember>,
    end: u32,
    max_alignment: u32,
}

impl StructLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute; duplicate names are ignored
    pub fn add_attribute(&mut self, attribute_type: AttributeType, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.members.iter().any(|member| member.name == name) {
            return false;
        }
        let alignment = attribute_type.alignment();
        let offset = self.end.div_ceil(alignment) * alignment;
        self.end = offset + attribute_type.byte_size();
        self.max_alignment = self.max_alignment.max(alignment);
        self.members.push(AttributeMember { name, attribute_type, offset });
        true
    }

    pub fn members(&self) -> &[AttributeMember] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Element stride in bytes (0 for an empty layout)
    pub fn byte_size(&self) -> u32 {
        if self.max_alignment == 0 {
            return 0;
        }
        self.end.div_ceil(self.max_alignment) * self.max_alignment
    }

    /// Vertex input layout reading elements of this struct
    pub fn vertex_layout(&self) -> VertexLayout {
        VertexLayout {
            stride: self.byte_size(),
            attributes: self.members.iter()
                .enumerate()
                .map(|(location, member)| VertexAttribute {
                    location: location as u32,
                    format: member.attribute_type.buffer_format(),
                    offset: member.offset,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "struct_layout_tests.rs"]
mod tests;
