//! Built-in transform components

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Local transform relative to the parent entity.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Transform {
    pub value: Mat4,
}

/// World-space transform, written by transform propagation.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalTransform {
    pub value: Mat4,
}

impl Transform {
    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            value: Mat4::from_scale_rotation_translation(scale, rotation, translation),
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            value: Mat4::from_translation(translation),
        }
    }

    pub fn translation(&self) -> Vec3 {
        self.value.w_axis.truncate()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self { value: Mat4::IDENTITY }
    }
}

impl Default for GlobalTransform {
    fn default() -> Self {
        Self { value: Mat4::IDENTITY }
    }
}
