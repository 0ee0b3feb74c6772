/// Vertex formats a material can declare as its vertex input

use crate::graphics_device::{VertexAttribute, VertexLayout};
use crate::material::struct_layout::AttributeType;

/// Vertex format of the meshes a material is drawn with
///
/// Discriminants are the integer values used in material files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexType {
    /// position, normal, tangent, texCoord
    #[default]
    Standard = 0,
    /// position, color, texCoord
    Colored = 1,
    /// position only
    Position = 2,
}

impl VertexType {
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => VertexType::Standard,
            1 => VertexType::Colored,
            2 => VertexType::Position,
            _ => return None,
        })
    }

    /// Attributes in location order
    pub fn attributes(self) -> &'static [(&'static str, AttributeType)] {
        match self {
            VertexType::Standard => &[
                ("position", AttributeType::Float3),
                ("normal", AttributeType::Float3),
                ("tangent", AttributeType::Float3),
                ("texCoord", AttributeType::Float2),
            ],
            VertexType::Colored => &[
                ("position", AttributeType::Float3),
                ("color", AttributeType::Float4),
                ("texCoord", AttributeType::Float2),
            ],
            VertexType::Position => &[
                ("position", AttributeType::Float3),
            ],
        }
    }

    /// Tightly packed interleaved layout
    pub fn vertex_layout(self) -> VertexLayout {
        let mut offset = 0;
        let attributes = self.attributes()
            .iter()
            .enumerate()
            .map(|(location, (_, attribute_type))| {
                let attribute = VertexAttribute {
                    location: location as u32,
                    format: attribute_type.buffer_format(),
                    offset,
                };
                offset += attribute_type.byte_size();
                attribute
            })
            .collect();
        VertexLayout { stride: offset, attributes }
    }
}
