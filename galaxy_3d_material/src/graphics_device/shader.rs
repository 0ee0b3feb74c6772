/// Shader trait and shader descriptor

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Fragment/Pixel shader
    Fragment,
    /// Compute shader
    Compute,
}

/// Descriptor for compiling a shader from HLSL source
#[derive(Debug, Clone)]
pub struct ShaderDesc<'a> {
    /// Complete HLSL source (generated declarations + shader body)
    pub source: &'a str,
    /// Shader stage
    pub stage: ShaderStage,
    /// Entry point function name
    pub entry_point: &'a str,
    /// Path of the shader body, used in compiler diagnostics
    pub debug_name: &'a str,
}

/// Compiled shader module
///
/// Compilation failures are reported by `GraphicsDevice::create_shader`,
/// so a live `Shader` is always valid.
pub trait Shader: Send + Sync {
    fn stage(&self) -> ShaderStage;
}
