use glam::{Mat4, Quat, Vec3};

use crate::{Error, Result};

/// Opaque entity identifier, unique within its scene. Packs `index + 1`
/// and a generation the same way registry handles do; `0` is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub(crate) u64);

impl EntityId {
    pub const INVALID: Self = Self(0);

    pub(crate) fn pack(index: u32, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | u64::from(index + 1))
    }

    pub(crate) fn unpack(self) -> Option<(u32, u32)> {
        let low = (self.0 & 0xFFFF_FFFF) as u32;
        if low == 0 {
            None
        } else {
            Some((low - 1, (self.0 >> 32) as u32))
        }
    }

    pub fn from_raw(raw: i64) -> Self {
        if raw <= 0 {
            Self::INVALID
        } else {
            Self(raw as u64)
        }
    }

    pub fn as_raw(self) -> i64 {
        self.0 as i64
    }
}

/// Local transform of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    pub(crate) fn validate_position(position: Vec3) -> Result<Vec3> {
        if position.is_finite() {
            Ok(position)
        } else {
            Err(Error::NonFinite { what: "position" })
        }
    }

    /// Quaternions are normalized on assignment; a zero-length or
    /// non-finite quaternion is rejected.
    pub(crate) fn validate_rotation(rotation: Quat) -> Result<Quat> {
        if !rotation.is_finite() || rotation.length_squared() < 1e-12 {
            return Err(Error::OutOfRange {
                what: "rotation",
                reason: "quaternion must be finite and non-zero",
            });
        }
        Ok(rotation.normalize())
    }

    /// Zero or non-finite scale components are rejected.
    pub(crate) fn validate_scale(scale: Vec3) -> Result<Vec3> {
        if !scale.is_finite() || scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
            return Err(Error::OutOfRange {
                what: "scale",
                reason: "components must be finite and non-zero",
            });
        }
        Ok(scale)
    }
}

/// Mesh renderer component. Mesh and material are registry handles owned
/// by the runtime; the scene stores only their raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRenderer {
    pub mesh: i64,
    pub material: i64,
    pub visible: bool,
}

/// One scene entity: implicit transform, id-linked hierarchy, optional
/// components.
#[derive(Debug, Clone)]
pub struct Entity {
    pub transform: Transform,
    pub parent: EntityId,
    pub children: Vec<EntityId>,
    pub mesh_renderer: Option<MeshRenderer>,
    pub light: Option<crate::Light>,
    pub camera: Option<crate::Camera>,
}

impl Entity {
    pub(crate) fn new() -> Self {
        Self {
            transform: Transform::default(),
            parent: EntityId::INVALID,
            children: Vec::new(),
            mesh_renderer: None,
            light: None,
            camera: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_is_normalized_on_assignment() {
        let q = Transform::validate_rotation(Quat::from_xyzw(0.0, 2.0, 0.0, 0.0)).unwrap();
        assert!((q.length() - 1.0).abs() < 1e-6);
        assert!(Transform::validate_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn scale_rejects_zero_components() {
        assert!(Transform::validate_scale(Vec3::new(1.0, 0.0, 1.0)).is_err());
        assert!(Transform::validate_scale(Vec3::new(1.0, f32::NAN, 1.0)).is_err());
        assert!(Transform::validate_scale(Vec3::new(2.0, -1.0, 0.5)).is_ok());
    }

    #[test]
    fn entity_id_packing() {
        let id = EntityId::pack(0, 0);
        assert_eq!(id.as_raw(), 1);
        assert_eq!(EntityId::from_raw(0), EntityId::INVALID);
        assert_eq!(EntityId::from_raw(-3), EntityId::INVALID);
        assert_eq!(EntityId::pack(5, 7).unpack(), Some((5, 7)));
    }
}
