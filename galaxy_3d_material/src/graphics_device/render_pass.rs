/// Render pass information consumed by material pipelines
///
/// The render pass itself is owned by the renderer; materials only need to
/// know which subpass and sample count a domain maps to, and which
/// attachments the fragment stage may read as textures.

use crate::graphics_device::TextureFormat;

/// Render pass category a material belongs to
///
/// Discriminants are the integer values used in material files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Domain {
    #[default]
    Forward = 0,
    Transparency = 1,
    PostProcess = 2,
    Unlit = 3,
}

impl Domain {
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => Domain::Forward,
            1 => Domain::Transparency,
            2 => Domain::PostProcess,
            3 => Domain::Unlit,
            _ => return None,
        })
    }
}

/// An attachment of a previous subpass readable by the fragment stage of one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAttachmentInfo {
    /// Variable name in HLSL
    pub name: String,
    /// Domain whose fragment shaders see this attachment
    pub domain: Domain,
    pub format: TextureFormat,
    pub multisampled: bool,
}

/// Render pass queries used when building material pipelines
pub trait RenderPassInfo: Send + Sync {
    /// Subpass index the domain renders in
    fn subpass_index(&self, domain: Domain) -> u32;

    /// Color attachment sample count of the domain's subpass
    fn sample_count(&self, domain: Domain) -> u32;

    /// Every input attachment of the pass, in global-set binding order
    fn input_attachments(&self) -> &[InputAttachmentInfo];
}
