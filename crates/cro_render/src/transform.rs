//! Transform component.

use glam::{Mat4, Quat, Vec3};

/// The world transform of an entity.
///
/// There is no hierarchy: every transform is a global transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// The position of the entity in the world.
    pub translation: Vec3,
    /// The rotation of the entity.
    pub rotation: Quat,
    /// The scale of the entity.
    pub scale: Vec3,
    /// The local point that translation, rotation and scale are applied around.
    pub origin: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            origin: Vec3::ZERO,
        }
    }
}

impl Transform {
    /// Create a transform from a translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a transform from a rotation.
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    /// Create a transform from a scale.
    pub fn from_scale(scale: Vec3) -> Self {
        Self {
            scale,
            ..Default::default()
        }
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    /// Move by the given offset.
    pub fn translate(&mut self, offset: Vec3) {
        self.translation += offset;
    }

    /// Converts the transform to a 4x4 matrix for rendering.
    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
            * Mat4::from_translation(-self.origin)
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn origin_is_pivot() {
        let tx = Transform {
            translation: Vec3::new(10.0, 0.0, 0.0),
            scale: Vec3::splat(2.0),
            origin: Vec3::new(1.0, 1.0, 0.0),
            ..default()
        };
        let m = tx.world_transform();
        assert_eq!(m.transform_point3(Vec3::new(1.0, 1.0, 0.0)), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(m.transform_point3(Vec3::new(2.0, 1.0, 0.0)), Vec3::new(12.0, 0.0, 0.0));
    }
}
