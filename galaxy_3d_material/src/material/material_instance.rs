/// MaterialInstance - value overrides of an existing material
///
/// An instance starts as a full copy of its parent's parameters and may
/// only change values of parameters that already exist; it can never add a
/// bindable parameter. The parent is identified by a generation-checked
/// `MaterialHandle`, so a reloaded parent is detected even though it lives
/// in the same registry slot.

use glam::Vec4;
use crate::graphics_device::{ColorSpace, TextureAssetInfo, TextureFormat};
use crate::material::material::{Material, ParameterKind};
use crate::material::material_layout::MaterialLayoutKey;
use crate::material::stage::MaterialStage;

/// Identity of one revision of a registered material
///
/// `generation` is bumped every time the material value behind `key` is
/// replaced or edited, so two handles are equal only if they name the same
/// revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MaterialHandle {
    pub key: MaterialLayoutKey,
    pub generation: u64,
}

impl MaterialHandle {
    pub fn new(key: MaterialLayoutKey, generation: u64) -> Self {
        Self { key, generation }
    }

    /// Handle of a material that is not registered anywhere
    pub fn detached() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialInstance {
    handle: MaterialHandle,
    parent: Material,
    material: Material,
}

impl Default for MaterialInstance {
    fn default() -> Self {
        Self::detached(&Material::default_material())
    }
}

impl MaterialInstance {
    pub fn new(parent: &Material, handle: MaterialHandle) -> Self {
        Self {
            handle,
            parent: parent.clone(),
            material: parent.clone(),
        }
    }

    /// Instance of a material that is not registered in a manager
    pub fn detached(parent: &Material) -> Self {
        Self::new(parent, MaterialHandle::detached())
    }

    pub fn parent_handle(&self) -> MaterialHandle {
        self.handle
    }

    /// Parent material value this instance was derived from
    pub fn parent_material(&self) -> &Material {
        &self.parent
    }

    /// Current values (parent values plus overrides)
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Mutable access for the resource layer (modified flags, resolved defaults)
    pub(crate) fn material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    pub fn is_instance_of(&self, handle: MaterialHandle) -> bool {
        self.handle == handle
    }

    // ===== OVERRIDES =====

    /// Override a scalar; returns false if the parent has no such scalar
    pub fn set_scalar(&mut self, stage: MaterialStage, name: &str, value: f32) -> bool {
        if self.material.parameter(stage, ParameterKind::Scalar, name).is_none() {
            return false;
        }
        self.material.set_scalar(stage, name, value);
        true
    }

    /// Override a vector; returns false if the parent has no such vector
    pub fn set_vector(&mut self, stage: MaterialStage, name: &str, value: Vec4) -> bool {
        if self.material.parameter(stage, ParameterKind::Vector, name).is_none() {
            return false;
        }
        self.material.set_vector(stage, name, value);
        true
    }

    /// Override a texture; returns false if the parent has no such texture
    ///
    /// An `Undefined` format or color space keeps the current one.
    pub fn set_texture(&mut self, stage: MaterialStage, name: &str, info: TextureAssetInfo) -> bool {
        let Some(current) = self.material.texture(stage, name) else {
            return false;
        };
        let format = if info.format == TextureFormat::Undefined { current.format } else { info.format };
        let color_space = if info.color_space == ColorSpace::Undefined { current.color_space } else { info.color_space };
        self.material.set_texture(stage, name, TextureAssetInfo::new(format, color_space, info.path));
        true
    }

    pub fn scalar(&self, stage: MaterialStage, name: &str) -> Option<f32> {
        self.material.scalar(stage, name)
    }

    pub fn vector(&self, stage: MaterialStage, name: &str) -> Option<Vec4> {
        self.material.vector(stage, name)
    }

    pub fn texture(&self, stage: MaterialStage, name: &str) -> Option<&TextureAssetInfo> {
        self.material.texture(stage, name)
    }

    // ===== RE-PARENTING =====

    /// Instance of `new_parent` carrying over every current value whose
    /// name exists in `new_parent`; other values are dropped
    pub fn make_redirected_instance(&self, new_parent: &Material, handle: MaterialHandle) -> MaterialInstance {
        let mut instance = MaterialInstance::new(new_parent, handle);
        for (stage, parameters) in self.material.parameter_table() {
            for parameter in parameters {
                if let Some(value) = parameter.as_scalar() {
                    instance.set_scalar(*stage, &parameter.name, value);
                } else if let Some(value) = parameter.as_vector() {
                    instance.set_vector(*stage, &parameter.name, value);
                } else if let Some(info) = parameter.as_texture() {
                    instance.set_texture(*stage, &parameter.name, info.clone());
                }
            }
        }
        instance
    }

    /// Drop every override
    pub fn reset(&mut self) {
        self.material = self.parent.clone();
    }
}

#[cfg(test)]
#[path = "material_instance_tests.rs"]
mod tests;
