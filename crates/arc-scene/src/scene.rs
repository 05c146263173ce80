use glam::{Mat4, Quat, Vec3};

use crate::entity::{Entity, EntityId, MeshRenderer, Transform};
use crate::{Camera, Error, Light, Result};

struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// One retained scene: an id-indexed entity table plus scene-level state.
///
/// Hierarchy links are stored as [`EntityId`]s in both directions, never as
/// references, so cycles in ownership are impossible by construction.
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: u32,
    active_camera: EntityId,
    /// Linear-RGB ambient term of the environment.
    pub ambient: Vec3,
    /// Reinhard output tonemapping; on by default.
    pub tonemap_enabled: bool,
    render_requested: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            active_camera: EntityId::INVALID,
            ambient: Vec3::splat(0.03),
            tonemap_enabled: true,
            render_requested: false,
        }
    }

    pub fn entity_count(&self) -> u32 {
        self.live
    }

    // --- entity lifetime ---

    pub fn create_entity(&mut self) -> EntityId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entity = Some(Entity::new());
            self.live += 1;
            EntityId::pack(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entity: Some(Entity::new()),
            });
            self.live += 1;
            EntityId::pack(index, 0)
        }
    }

    /// Destroys an entity, its components, and all its descendants.
    /// Destroying an already-dead id is a no-op.
    pub fn destroy_entity(&mut self, id: EntityId) {
        let Ok(entity) = self.get(id) else { return };
        let parent = entity.parent;
        let mut stack = vec![id];
        // Detach from the surviving parent first.
        if let Ok(parent) = self.get_mut(parent) {
            parent.children.retain(|child| *child != id);
        }
        while let Some(current) = stack.pop() {
            if let Ok(entity) = self.get(current) {
                stack.extend(entity.children.iter().copied());
            }
            if let Some((index, _)) = self.live_index(current) {
                let slot = &mut self.slots[index];
                slot.entity = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                self.live -= 1;
            }
        }
        if self.live_index(self.active_camera).is_none() {
            self.active_camera = EntityId::INVALID;
        }
    }

    pub fn get(&self, id: EntityId) -> Result<&Entity> {
        self.live_index(id)
            .map(|(index, _)| self.slots[index].entity.as_ref().unwrap())
            .ok_or(Error::UnknownEntity(id))
    }

    pub fn get_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        match self.live_index(id) {
            Some((index, _)) => Ok(self.slots[index].entity.as_mut().unwrap()),
            None => Err(Error::UnknownEntity(id)),
        }
    }

    fn live_index(&self, id: EntityId) -> Option<(usize, u32)> {
        let (index, generation) = id.unpack()?;
        let slot = self.slots.get(index as usize)?;
        if slot.generation == generation && slot.entity.is_some() {
            Some((index as usize, generation))
        } else {
            None
        }
    }

    /// Live entity ids in slot order (deterministic).
    pub fn iter_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entity
                .as_ref()
                .map(|_| EntityId::pack(index as u32, slot.generation))
        })
    }

    // --- hierarchy ---

    /// Makes `child` a child of `parent` (or a root with `INVALID`).
    /// Rejects self-parenting and descendants-as-parents.
    pub fn set_parent(&mut self, child: EntityId, parent: EntityId) -> Result<()> {
        self.get(child)?;
        if parent != EntityId::INVALID {
            self.get(parent)?;
            // Walking up from `parent` must not reach `child`.
            let mut cursor = parent;
            while cursor != EntityId::INVALID {
                if cursor == child {
                    return Err(Error::OutOfRange {
                        what: "parent",
                        reason: "cannot parent an entity to its descendant",
                    });
                }
                cursor = self.get(cursor)?.parent;
            }
        }

        let old_parent = self.get(child)?.parent;
        if let Ok(entity) = self.get_mut(old_parent) {
            entity.children.retain(|c| *c != child);
        }
        self.get_mut(child)?.parent = parent;
        if parent != EntityId::INVALID {
            self.get_mut(parent)?.children.push(child);
        }
        Ok(())
    }

    /// World matrix: the product of local matrices up the parent chain.
    pub fn world_matrix(&self, id: EntityId) -> Result<Mat4> {
        let mut matrix = self.get(id)?.transform.matrix();
        let mut cursor = self.get(id)?.parent;
        while cursor != EntityId::INVALID {
            let entity = self.get(cursor)?;
            matrix = entity.transform.matrix() * matrix;
            cursor = entity.parent;
        }
        Ok(matrix)
    }

    // --- transforms ---

    pub fn set_position(&mut self, id: EntityId, position: Vec3) -> Result<()> {
        let position = Transform::validate_position(position)?;
        self.get_mut(id)?.transform.position = position;
        Ok(())
    }

    pub fn set_rotation(&mut self, id: EntityId, rotation: Quat) -> Result<()> {
        let rotation = Transform::validate_rotation(rotation)?;
        self.get_mut(id)?.transform.rotation = rotation;
        Ok(())
    }

    pub fn set_scale(&mut self, id: EntityId, scale: Vec3) -> Result<()> {
        let scale = Transform::validate_scale(scale)?;
        self.get_mut(id)?.transform.scale = scale;
        Ok(())
    }

    // --- components ---

    pub fn set_mesh_renderer(&mut self, id: EntityId, renderer: Option<MeshRenderer>) -> Result<()> {
        self.get_mut(id)?.mesh_renderer = renderer;
        Ok(())
    }

    pub fn set_light(&mut self, id: EntityId, light: Option<Light>) -> Result<()> {
        let light = light.map(Light::validate).transpose()?;
        self.get_mut(id)?.light = light;
        Ok(())
    }

    pub fn set_camera(&mut self, id: EntityId, camera: Option<Camera>) -> Result<()> {
        if let Some(camera) = &camera {
            camera.projection.validate()?;
        }
        self.get_mut(id)?.camera = camera;
        Ok(())
    }

    /// Exactly one camera is active per scene; rendering without one fails
    /// safely at the pipeline level.
    pub fn set_active_camera(&mut self, id: EntityId) -> Result<()> {
        if self.get(id)?.camera.is_none() {
            return Err(Error::OutOfRange {
                what: "active camera",
                reason: "entity has no camera component",
            });
        }
        self.active_camera = id;
        Ok(())
    }

    pub fn active_camera(&self) -> Option<EntityId> {
        if self.live_index(self.active_camera).is_some() {
            Some(self.active_camera)
        } else {
            None
        }
    }

    // --- render request ---

    /// Marks the scene for rendering this frame. Calling it repeatedly
    /// within one frame keeps only the last request visible by definition.
    pub fn request_render(&mut self) -> bool {
        let repeated = self.render_requested;
        self.render_requested = true;
        repeated
    }

    /// Consumes the render-request flag; called once per frame by the
    /// pipeline.
    pub fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CameraView, LightKind, Projection};

    #[test]
    fn destroy_is_recursive_and_idempotent() {
        let mut scene = Scene::new();
        let root = scene.create_entity();
        let child = scene.create_entity();
        let grandchild = scene.create_entity();
        scene.set_parent(child, root).unwrap();
        scene.set_parent(grandchild, child).unwrap();
        assert_eq!(scene.entity_count(), 3);

        scene.destroy_entity(root);
        assert_eq!(scene.entity_count(), 0);
        assert!(scene.get(child).is_err());
        assert!(scene.get(grandchild).is_err());

        // No-op on dead ids.
        scene.destroy_entity(root);
        assert_eq!(scene.entity_count(), 0);
    }

    #[test]
    fn stale_ids_do_not_alias() {
        let mut scene = Scene::new();
        let old = scene.create_entity();
        scene.destroy_entity(old);
        let new = scene.create_entity();
        assert_ne!(old, new);
        assert!(scene.get(old).is_err());
        assert!(scene.get(new).is_ok());
    }

    #[test]
    fn cyclic_parenting_is_rejected() {
        let mut scene = Scene::new();
        let a = scene.create_entity();
        let b = scene.create_entity();
        scene.set_parent(b, a).unwrap();
        assert!(scene.set_parent(a, b).is_err());
        assert!(scene.set_parent(a, a).is_err());
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let parent = scene.create_entity();
        let child = scene.create_entity();
        scene.set_parent(child, parent).unwrap();
        scene.set_position(parent, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        scene.set_position(child, Vec3::new(0.0, 5.0, 0.0)).unwrap();

        let world = scene.world_matrix(child).unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(10.0, 5.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn active_camera_requires_a_camera_component() {
        let mut scene = Scene::new();
        let entity = scene.create_entity();
        assert!(scene.set_active_camera(entity).is_err());

        scene
            .set_camera(
                entity,
                Some(Camera {
                    projection: Projection::Perspective {
                        fov_y: 1.0,
                        near: 0.1,
                        far: 100.0,
                    },
                    view: CameraView::FromEntity,
                }),
            )
            .unwrap();
        scene.set_active_camera(entity).unwrap();
        assert_eq!(scene.active_camera(), Some(entity));

        // Destroying the camera entity clears the active camera.
        scene.destroy_entity(entity);
        assert_eq!(scene.active_camera(), None);
    }

    #[test]
    fn component_validation_goes_through_setters() {
        let mut scene = Scene::new();
        let entity = scene.create_entity();
        assert!(scene
            .set_light(
                entity,
                Some(Light {
                    kind: LightKind::Point { range: -1.0 },
                    color: Vec3::ONE,
                    intensity: 1.0,
                }),
            )
            .is_err());
        assert!(scene.set_scale(entity, Vec3::ZERO).is_err());
        assert!(scene.set_rotation(entity, Quat::from_xyzw(0.0, 3.0, 0.0, 0.0)).is_ok());
        let q = scene.get(entity).unwrap().transform.rotation;
        assert!((q.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn render_request_flag_latches_once_per_frame() {
        let mut scene = Scene::new();
        assert!(!scene.request_render());
        assert!(scene.request_render());
        assert!(scene.take_render_request());
        assert!(!scene.take_render_request());
    }
}
