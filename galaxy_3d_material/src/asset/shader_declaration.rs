/// HLSL declaration synthesis
///
/// Builds the resource declarations prepended to a material's shader
/// bodies: uniform blocks, textures, structured buffers and the vertex
/// input struct. Binding numbers come from `BindingPlan`, so declarations
/// always match the set layouts the material layout creates.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use crate::graphics_device::{Domain, InputAttachmentInfo, ShaderStage};
use crate::material::binding_plan::{BindingPlan, BindingSlot};
use crate::material::compute_task::ComputeTask;
use crate::material::material::{Material, ParameterKind};
use crate::material::stage::{
    GlobalSetBinding, MaterialStage, GLOBAL_SET_INDEX, MESH_UNIFORM_BINDING, PER_OBJECT_SET_INDEX,
    STAGE_UNIFORM_BINDING,
};
use crate::material::struct_layout::StructLayout;
use crate::material::uniforms::{GlobalUniform, MeshUniform, UniformMember};
use crate::material::vertex_type::VertexType;

/// Generated declarations per shader stage
pub type ShaderDeclarations = BTreeMap<ShaderStage, String>;

// ============================================================================
// Building blocks
// ============================================================================

/// `cbuffer` block at (`set`, `binding`)
pub fn uniform_block(struct_name: &str, members: &str, set: u32, binding: u32) -> String {
    format!("[[vk::binding({}, {})]] cbuffer {} {{\n{}}};\n", binding, set, struct_name, members)
}

/// Members of an engine-provided uniform block
pub fn engine_uniform_members(members: &[UniformMember]) -> String {
    members
        .iter()
        .map(|(hlsl_type, name)| format!("\t{} {};\n", hlsl_type, name))
        .collect()
}

/// Members of a material stage block: scalars, padding, then vectors
pub fn material_uniform_members(material: &Material, stage: MaterialStage) -> String {
    let mut members = String::new();
    for scalar in material.parameters(stage, ParameterKind::Scalar) {
        members += &format!("\tfloat {};\n", scalar.name);
    }
    for index in 0..material.scalar_padding_size(stage) {
        members += &format!("\tfloat __padding_{}_{};\n", stage.value(), index);
    }
    for vector in material.parameters(stage, ParameterKind::Vector) {
        members += &format!("\tfloat4 {};\n", vector.name);
    }
    members
}

/// Uniform block of a material stage, or nothing if the stage has no scalars or vectors
pub fn material_uniform_block(material: &Material, stage: MaterialStage, struct_name: &str) -> String {
    let members = material_uniform_members(material, stage);
    if members.is_empty() {
        return String::new();
    }
    uniform_block(struct_name, &members, stage.set_index(), STAGE_UNIFORM_BINDING)
}

/// Texture plus its `{name}Sampler`, both on the same combined binding
pub fn combined_texture_sampler(set: u32, binding: u32, pixel_type: &str, name: &str, multisampled: bool) -> String {
    let head = format!("[[vk::combinedImageSampler]] [[vk::binding({}, {})]] ", binding, set);
    let texture_type = if multisampled { "Texture2DMS" } else { "Texture2D" };
    format!(
        "{head}{texture_type}<{pixel_type}> {name};\n{head}SamplerState {name}Sampler;\n",
        head = head,
        texture_type = texture_type,
        pixel_type = pixel_type,
        name = name,
    )
}

/// Structured buffer alias; read-write aliases use a `u` register
pub fn storage_buffer(set: u32, binding: u32, read_write: bool, struct_name: &str, name: &str) -> String {
    if read_write {
        format!(
            "[[vk::binding({b}, {s})]] RWStructuredBuffer<{t}> {n} : register(u{b}, space{s});\n",
            b = binding, s = set, t = struct_name, n = name,
        )
    } else {
        format!(
            "[[vk::binding({b}, {s})]] StructuredBuffer<{t}> {n} : register(t{b}, space{s});\n",
            b = binding, s = set, t = struct_name, n = name,
        )
    }
}

/// Element structs of every SSBO of the task
pub fn storage_buffer_structs(task: &ComputeTask) -> String {
    let mut declaration = String::new();
    for info in task.ssbo_infos() {
        declaration += &format!("struct {} {{\n", info.struct_name());
        for member in info.element_layout.members() {
            declaration += &format!("{} {};\n", member.attribute_type.hlsl_type_name(), member.name);
        }
        declaration += "};\n";
    }
    declaration
}

/// `VSInput` read from an SSBO element layout
pub fn vertex_input_from_layout(layout: &StructLayout) -> String {
    let mut declaration = String::from("struct VSInput {\n");
    for (location, member) in layout.members().iter().enumerate() {
        declaration += &format!(
            "[[vk::location({})]] {} {} : {};\n",
            location,
            member.attribute_type.hlsl_type_name(),
            member.name,
            member.name.to_uppercase(),
        );
    }
    declaration += "};\n";
    declaration
}

/// `VSInput` of a built-in vertex type, with the instance index
pub fn vertex_input_from_type(vertex_type: VertexType) -> String {
    let mut declaration = String::from("struct VSInput {\n");
    for (location, (name, attribute_type)) in vertex_type.attributes().iter().enumerate() {
        declaration += &format!(
            "[[vk::location({})]] {} {} : {};\n",
            location,
            attribute_type.hlsl_type_name(),
            name,
            name.to_uppercase(),
        );
    }
    declaration += "uint instanceID : SV_InstanceID;\n";
    declaration += "};\n";
    declaration
}

/// Global textures (ambient, shadow map), built once
pub fn global_texture_declarations() -> &'static str {
    static DECLARATIONS: OnceLock<String> = OnceLock::new();
    DECLARATIONS.get_or_init(|| {
        GlobalSetBinding::TEXTURES
            .iter()
            .map(|texture| {
                combined_texture_sampler(
                    GLOBAL_SET_INDEX,
                    texture.binding(),
                    texture.texture_format().hlsl_pixel_type(),
                    texture.name(),
                    false,
                )
            })
            .collect()
    })
}

/// Input attachments of `domain`
///
/// Attachments are numbered in the global set from `GlobalSetBinding::COUNT`
/// across all domains; only those matching `domain` are declared.
pub fn input_attachment_declarations(domain: Domain, infos: &[InputAttachmentInfo]) -> String {
    infos
        .iter()
        .zip(GlobalSetBinding::COUNT..)
        .filter(|(info, _)| info.domain == domain)
        .map(|(info, binding)| {
            combined_texture_sampler(
                GLOBAL_SET_INDEX,
                binding,
                info.format.hlsl_pixel_type(),
                &info.name,
                info.multisampled,
            )
        })
        .collect()
}

/// Texture declarations of a stage, from its binding plan
pub fn stage_texture_declarations(material: &Material, plan: &BindingPlan) -> String {
    let stage = plan.stage();
    plan.entries()
        .iter()
        .filter_map(|entry| match &entry.slot {
            BindingSlot::Texture { name } => {
                let info = material.texture(stage, name)?;
                Some(combined_texture_sampler(
                    stage.set_index(),
                    entry.binding,
                    info.format.hlsl_pixel_type(),
                    name,
                    false,
                ))
            }
            _ => None,
        })
        .collect()
}

/// SSBO alias declarations of a stage, from its binding plan
pub fn stage_storage_declarations(plan: &BindingPlan) -> String {
    let set = plan.stage().set_index();
    plan.entries()
        .iter()
        .filter_map(|entry| match &entry.slot {
            BindingSlot::StorageAlias { ssbo, alias, read_write, .. } => Some(storage_buffer(
                set,
                entry.binding,
                *read_write,
                &format!("{}Struct", ssbo),
                alias,
            )),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Per-stage assembly
// ============================================================================

/// Declarations of every shader stage of `material`
///
/// Vertex and fragment are always produced; compute only with a compute task.
pub fn build_shader_declarations(material: &Material, frames_in_flight: usize) -> ShaderDeclarations {
    let plan = |stage| BindingPlan::new(material, stage, frames_in_flight);

    let global_uniform = uniform_block(
        GlobalSetBinding::GlobalUniform.name(),
        &engine_uniform_members(GlobalUniform::HLSL_MEMBERS),
        GLOBAL_SET_INDEX,
        GlobalSetBinding::GlobalUniform.binding(),
    );
    let shared_uniform = material_uniform_block(material, MaterialStage::Shared, "MaterialSharedUniform");
    let shared_textures = stage_texture_declarations(material, &plan(MaterialStage::Shared));

    let mut vertex = String::new();
    vertex += &global_uniform;
    vertex += &uniform_block(
        "PerObjectUniform",
        &engine_uniform_members(MeshUniform::HLSL_MEMBERS),
        PER_OBJECT_SET_INDEX,
        MESH_UNIFORM_BINDING,
    );
    vertex += &material_uniform_block(material, MaterialStage::Vertex, "MaterialVertexUniform");
    vertex += &shared_uniform;
    vertex += &stage_texture_declarations(material, &plan(MaterialStage::Vertex));
    vertex += &shared_textures;
    match material.compute_task().and_then(ComputeTask::vertex_input_ssbo) {
        Some(info) => vertex += &vertex_input_from_layout(&info.element_layout),
        None => vertex += &vertex_input_from_type(material.vertex_type()),
    }

    let mut fragment = String::new();
    fragment += &global_uniform;
    fragment += global_texture_declarations();
    fragment += &material_uniform_block(material, MaterialStage::Fragment, "MaterialFragmentUniform");
    fragment += &shared_uniform;
    fragment += &stage_texture_declarations(material, &plan(MaterialStage::Fragment));
    fragment += &shared_textures;

    let mut declarations = ShaderDeclarations::new();
    if let Some(task) = material.compute_task() {
        let structs = storage_buffer_structs(task);
        let compute_vertex = stage_storage_declarations(&plan(MaterialStage::ComputeVertex));
        let compute_fragment = stage_storage_declarations(&plan(MaterialStage::ComputeFragment));

        let mut compute = String::new();
        compute += &global_uniform;
        compute += &structs;
        compute += &stage_storage_declarations(&plan(MaterialStage::Compute));
        compute += &compute_vertex;
        compute += &compute_fragment;
        declarations.insert(ShaderStage::Compute, compute);

        vertex += &structs;
        vertex += &compute_vertex;
        fragment += &structs;
        fragment += &compute_fragment;
    }
    declarations.insert(ShaderStage::Vertex, vertex);
    declarations.insert(ShaderStage::Fragment, fragment);
    declarations
}

#[cfg(test)]
#[path = "shader_declaration_tests.rs"]
mod tests;
