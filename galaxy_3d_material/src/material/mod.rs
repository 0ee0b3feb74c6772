/// Material module - materials, instances, compute tasks and their GPU-side state

pub mod stage;
pub mod struct_layout;
pub mod vertex_type;
pub mod compute_task;
pub mod material;
pub mod material_instance;
pub mod binding_plan;
pub mod uniforms;
pub mod material_layout;
pub mod material_resource;
pub mod material_manager;

pub use stage::{
    MaterialStage, GlobalSetBinding, GLOBAL_SET_INDEX, PER_OBJECT_SET_INDEX, MATERIAL_SET_INDEX_BEGIN,
    MESH_UNIFORM_BINDING, STAGE_UNIFORM_BINDING,
};
pub use struct_layout::{AttributeType, AttributeMember, StructLayout};
pub use vertex_type::VertexType;
pub use compute_task::{ComputeTask, SsboInfo, SsboUsage, SsboAccessMode, SsboInitMode};
pub use material::{Material, Parameter, ParameterKind, ParameterTable, ParameterValue};
pub use material_instance::{MaterialInstance, MaterialHandle};
pub use binding_plan::{BindingPlan, BindingPlanEntry, BindingSlot};
pub use uniforms::{GlobalUniform, MeshUniform};
pub use material_layout::{MaterialLayout, MaterialLayoutKey, SsboInitPipeline};
pub use material_resource::{MaterialResource, MaterialResourceKey, ResourceUpdateContext};
pub use material_manager::{MaterialManager, MaterialManagerDesc, DescriptorSetReferences};
