/// Compute task owned by a material
///
/// A compute task describes one compute dispatch: its shader, dispatch size
/// and frequency, and the structured buffers (SSBOs) it reads and writes.
///
/// A ReadWrite SSBO is multiplexed over the frames in flight: it owns one
/// buffer per frame slot and is declared as one alias per slot, ordered from
/// oldest to newest. With F frames in flight and F = 3:
///
/// ```text
/// particlesIn1   (2 frames ago, read only)
/// particlesIn    (1 frame ago,  read only)
/// particlesOut   (current frame, read write)
/// ```
///
/// The aliases rotate over the physical buffers frame by frame, so the
/// `Out` alias always targets the current frame slot's buffer.

use crate::material::stage::MaterialStage;
use crate::material::struct_layout::StructLayout;
use crate::graphics_device::BufferUsage;

/// How an SSBO is consumed besides compute
///
/// Discriminants are the integer values used in material files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SsboUsage {
    #[default]
    Storage = 0,
    /// Also bound as a vertex buffer by the graphics pipeline
    Vertex = 1,
}

impl SsboUsage {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(SsboUsage::Storage),
            1 => Some(SsboUsage::Vertex),
            _ => None,
        }
    }

    pub fn buffer_usage(self) -> BufferUsage {
        match self {
            SsboUsage::Storage => BufferUsage::Storage,
            SsboUsage::Vertex => BufferUsage::StorageVertex,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SsboAccessMode {
    #[default]
    ReadOnly = 0,
    ReadWrite = 1,
}

impl SsboAccessMode {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(SsboAccessMode::ReadOnly),
            1 => Some(SsboAccessMode::ReadWrite),
            _ => None,
        }
    }
}

/// Initial contents of an SSBO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SsboInitMode {
    /// Zero-filled
    #[default]
    Zero = 0,
    /// Zero-filled, then written by an init compute shader (`init_resource`)
    FromResource = 1,
}

impl SsboInitMode {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(SsboInitMode::Zero),
            1 => Some(SsboInitMode::FromResource),
            _ => None,
        }
    }
}

/// Description of one structured buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsboInfo {
    pub name: String,
    /// Stage (and therefore descriptor set) the buffer is bound in
    pub stage: MaterialStage,
    pub usage: SsboUsage,
    pub access_mode: SsboAccessMode,
    pub init_mode: SsboInitMode,
    /// Shader body path of the init compute shader (`FromResource` only)
    pub init_resource: String,
    pub element_layout: StructLayout,
    pub num_elements: u32,
}

impl SsboInfo {
    /// Size of one physical buffer in bytes
    pub fn byte_size(&self) -> u64 {
        self.element_layout.byte_size() as u64 * self.num_elements as u64
    }

    /// HLSL struct name of one element
    pub fn struct_name(&self) -> String {
        format!("{}Struct", self.name)
    }

    /// Initial bytes of every physical buffer
    ///
    /// Both init modes start from zeroes; `FromResource` buffers are then
    /// filled on the GPU by the layout's init pipelines.
    pub fn initial_data(&self) -> Vec<u8> {
        vec![0u8; self.byte_size() as usize]
    }
}

/// One compute dispatch owned by a material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeTask {
    compute_only: bool,
    compute_shader_path: String,
    dispatch_group: [u32; 3],
    dispatch_frequency: u32,
    vertex_input_ssbo: Option<String>,
    ssbo_infos: Vec<SsboInfo>,
}

impl Default for ComputeTask {
    fn default() -> Self {
        Self {
            compute_only: false,
            compute_shader_path: String::new(),
            dispatch_group: [1, 1, 1],
            dispatch_frequency: 1,
            vertex_input_ssbo: None,
            ssbo_infos: Vec::new(),
        }
    }
}

impl ComputeTask {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== SETTERS =====

    pub fn set_compute_only(&mut self, compute_only: bool) {
        self.compute_only = compute_only;
    }

    pub fn set_compute_shader(&mut self, path: impl Into<String>) {
        self.compute_shader_path = path.into();
    }

    pub fn set_dispatch_group(&mut self, group: [u32; 3]) {
        self.dispatch_group = group;
    }

    /// Dispatch every `frequency` frames (0 dispatches once, on frame 0)
    pub fn set_dispatch_frequency(&mut self, frequency: u32) {
        self.dispatch_frequency = frequency;
    }

    /// Add an SSBO, replacing any SSBO with the same name
    pub fn add_ssbo_info(&mut self, info: SsboInfo) {
        match self.ssbo_infos.iter_mut().find(|existing| existing.name == info.name) {
            Some(existing) => *existing = info,
            None => self.ssbo_infos.push(info),
        }
    }

    /// Remove an SSBO by name (clears the vertex input designation if it pointed there)
    pub fn remove_ssbo_info(&mut self, name: &str) -> bool {
        let before = self.ssbo_infos.len();
        self.ssbo_infos.retain(|info| info.name != name);
        if self.vertex_input_ssbo.as_deref() == Some(name) {
            self.vertex_input_ssbo = None;
        }
        self.ssbo_infos.len() != before
    }

    /// Designate the SSBO read as vertex input; returns false if `name` is unknown
    pub fn set_vertex_input_ssbo(&mut self, name: Option<&str>) -> bool {
        match name {
            None => {
                self.vertex_input_ssbo = None;
                true
            }
            Some(name) if self.find_ssbo_info(name).is_some() => {
                self.vertex_input_ssbo = Some(name.to_string());
                true
            }
            Some(_) => false,
        }
    }

    // ===== ACCESSORS =====

    pub fn is_compute_only(&self) -> bool {
        self.compute_only
    }

    pub fn compute_shader_path(&self) -> &str {
        &self.compute_shader_path
    }

    pub fn dispatch_group(&self) -> [u32; 3] {
        self.dispatch_group
    }

    pub fn dispatch_frequency(&self) -> u32 {
        self.dispatch_frequency
    }

    pub fn ssbo_infos(&self) -> &[SsboInfo] {
        &self.ssbo_infos
    }

    pub fn find_ssbo_info(&self, name: &str) -> Option<&SsboInfo> {
        self.ssbo_infos.iter().find(|info| info.name == name)
    }

    /// SSBO bound as vertex input of the graphics pipeline, if any
    pub fn vertex_input_ssbo(&self) -> Option<&SsboInfo> {
        self.vertex_input_ssbo.as_deref().and_then(|name| self.find_ssbo_info(name))
    }

    /// SSBOs that need an init compute pipeline
    pub fn resource_init_ssbo_infos(&self) -> Vec<&SsboInfo> {
        self.ssbo_infos
            .iter()
            .filter(|info| info.init_mode == SsboInitMode::FromResource)
            .collect()
    }

    /// SSBOs bound in `stage`, in declaration order
    pub fn stage_ssbo_infos(&self, stage: MaterialStage) -> impl Iterator<Item = &SsboInfo> {
        self.ssbo_infos.iter().filter(move |info| info.stage == stage)
    }

    /// Number of physical buffers (and aliases) of an SSBO
    pub fn num_ssbos(info: &SsboInfo, frames_in_flight: usize) -> usize {
        match info.access_mode {
            SsboAccessMode::ReadOnly => 1,
            SsboAccessMode::ReadWrite => frames_in_flight.max(1),
        }
    }

    /// Alias names of an SSBO, oldest first
    pub fn ssbo_declaration_names(info: &SsboInfo, frames_in_flight: usize) -> Vec<String> {
        let count = Self::num_ssbos(info, frames_in_flight);
        if info.access_mode == SsboAccessMode::ReadOnly {
            return vec![info.name.clone()];
        }
        (0..count)
            .map(|alias| match Self::alias_lag(alias, count) {
                0 => format!("{}Out", info.name),
                1 => format!("{}In", info.name),
                lag => format!("{}In{}", info.name, lag - 1),
            })
            .collect()
    }

    /// How many frames behind the current one alias `alias` reads
    pub fn alias_lag(alias: usize, alias_count: usize) -> usize {
        alias_count.saturating_sub(alias + 1)
    }

    /// Physical buffer bound to `alias` while recording frame slot `frame_index`
    pub fn alias_buffer_index(alias: usize, alias_count: usize, frame_index: usize) -> usize {
        if alias_count <= 1 {
            return 0;
        }
        let lag = Self::alias_lag(alias, alias_count);
        (frame_index % alias_count + alias_count - lag) % alias_count
    }

    /// Whether the dispatch runs on frame number `frame_counter`
    pub fn should_dispatch(&self, frame_counter: u64) -> bool {
        match self.dispatch_frequency {
            0 => frame_counter == 0,
            frequency => frame_counter % frequency as u64 == 0,
        }
    }
}

#[cfg(test)]
#[path = "compute_task_tests.rs"]
mod tests;
