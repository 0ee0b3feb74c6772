/// Binding numbers of one material stage's descriptor set
///
/// The plan is the single source of truth for binding numbers: the set
/// layout, the generated HLSL declarations and the resource writes all
/// read it, so they cannot disagree.
///
/// Per stage:
/// - binding 0: packed uniform block (always present in the layout)
/// - bindings 1..=N: textures, in declaration order
/// - then every alias of every SSBO bound in the stage, SSBOs in
///   declaration order, aliases oldest first

use crate::graphics_device::{BindingGroupLayoutDesc, BindingType};
use crate::material::compute_task::{ComputeTask, SsboAccessMode};
use crate::material::material::{Material, ParameterKind};
use crate::material::stage::{MaterialStage, STAGE_UNIFORM_BINDING};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSlot {
    Uniform,
    Texture {
        name: String,
    },
    StorageAlias {
        ssbo: String,
        alias: String,
        alias_index: usize,
        alias_count: usize,
        read_write: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlanEntry {
    pub binding: u32,
    pub slot: BindingSlot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    stage: MaterialStage,
    entries: Vec<BindingPlanEntry>,
}

impl BindingPlan {
    pub fn new(material: &Material, stage: MaterialStage, frames_in_flight: usize) -> Self {
        let mut entries = vec![BindingPlanEntry {
            binding: STAGE_UNIFORM_BINDING,
            slot: BindingSlot::Uniform,
        }];
        let mut next_binding = STAGE_UNIFORM_BINDING + 1;

        for texture in material.parameters(stage, ParameterKind::Texture) {
            entries.push(BindingPlanEntry {
                binding: next_binding,
                slot: BindingSlot::Texture { name: texture.name.clone() },
            });
            next_binding += 1;
        }

        if let Some(task) = material.compute_task() {
            for info in task.stage_ssbo_infos(stage) {
                let aliases = ComputeTask::ssbo_declaration_names(info, frames_in_flight);
                let alias_count = aliases.len();
                for (alias_index, alias) in aliases.into_iter().enumerate() {
                    // Only the newest alias may be written
                    let read_write = info.access_mode == SsboAccessMode::ReadWrite
                        && alias_index + 1 == alias_count;
                    entries.push(BindingPlanEntry {
                        binding: next_binding,
                        slot: BindingSlot::StorageAlias {
                            ssbo: info.name.clone(),
                            alias,
                            alias_index,
                            alias_count,
                            read_write,
                        },
                    });
                    next_binding += 1;
                }
            }
        }

        Self { stage, entries }
    }

    pub fn stage(&self) -> MaterialStage {
        self.stage
    }

    pub fn entries(&self) -> &[BindingPlanEntry] {
        &self.entries
    }

    pub fn texture_binding(&self, name: &str) -> Option<u32> {
        self.entries.iter().find_map(|entry| match &entry.slot {
            BindingSlot::Texture { name: texture } if texture == name => Some(entry.binding),
            _ => None,
        })
    }

    /// Storage alias entries of one SSBO, oldest first
    pub fn storage_aliases<'a>(&'a self, ssbo: &'a str) -> impl Iterator<Item = &'a BindingPlanEntry> + 'a {
        self.entries.iter().filter(move |entry| {
            matches!(&entry.slot, BindingSlot::StorageAlias { ssbo: name, .. } if name == ssbo)
        })
    }

    /// Set layout matching this plan
    pub fn layout_desc(&self) -> BindingGroupLayoutDesc {
        let visibility = self.stage.visibility();
        let mut desc = BindingGroupLayoutDesc::default();
        for entry in &self.entries {
            let binding_type = match entry.slot {
                BindingSlot::Uniform => BindingType::UniformBuffer,
                BindingSlot::Texture { .. } => BindingType::CombinedImageSampler,
                BindingSlot::StorageAlias { .. } => BindingType::StorageBuffer,
            };
            desc.append(binding_type, visibility);
        }
        desc
    }
}

#[cfg(test)]
#[path = "binding_plan_tests.rs"]
mod tests;
