use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Quat, Vec3};
use id_arena::Arena;

use crate::math::AABB;
use crate::model::{Mesh, MeshId, Skin, SkinId};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::transform::Transform;

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Totals shown in the model info panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    pub vertices: usize,
    pub faces: usize,
}

/// Node hierarchy of one loaded asset.
///
/// Every model has a synthetic root group; its transform is the model
/// transform that normalization and immersive sessions adjust.
pub struct SceneModel {
    pub name: String,
    pub objects: Arena<Object3D>,
    pub meshes: Arena<Mesh>,
    pub skins: Arena<Skin>,
    root: ObjectId,
    id: u64,
}

impl SceneModel {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut objects = Arena::new();
        let root = objects.alloc(Object3D::named(name.clone()));

        Self {
            name,
            objects,
            meshes: Arena::new(),
            skins: Arena::new(),
            root,
            id: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Unique per constructed model; used by the renderer to key GPU uploads.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// Adds an object as a child of `parent`, or of the root when `None`.
    pub fn add_object(&mut self, object: Object3D, parent: Option<ObjectId>) -> ObjectId {
        let object_id = self.objects.alloc(object);
        self.set_object_parent(object_id, Some(parent.unwrap_or(self.root)));
        object_id
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.alloc(mesh)
    }

    pub fn add_skin(&mut self, skin: Skin) -> SkinId {
        self.skins.alloc(skin)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Option<&mut Object3D> {
        self.objects.get_mut(id)
    }

    /// Sets the parent of an object and updates child relationships
    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(old_parent_id) = self.objects.get(child_id).and_then(|c| c.parent_id) {
            if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;
        }

        if let Some(new_parent) = new_parent_id.and_then(|id| self.objects.get_mut(id)) {
            new_parent.child_ids.push(child_id);
        }

        self.invalidate_object_hierarchy(child_id);
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    pub fn set_object_translation(&mut self, object_id: ObjectId, translation: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_translation(translation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_rotation(&mut self, object_id: ObjectId, rotation: Quat) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_rotation(rotation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_scale(&mut self, object_id: ObjectId, scale: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_scale(scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_transform(
        &mut self,
        object_id: ObjectId,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_transform(translation, rotation, scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn get_object_transform(&self, object_id: ObjectId) -> Option<&Transform> {
        self.objects.get(object_id).map(|object| &object.transform)
    }

    pub fn root_transform(&self) -> &Transform {
        &self.objects[self.root].transform
    }

    pub fn world_matrix(&self, object_id: ObjectId) -> Mat4 {
        self.objects
            .get(object_id)
            .map(|object| object.transform.world_matrix())
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Recomputes world matrices of every dirty subtree, starting at the root.
    pub fn update_world_matrices(&self) {
        self.update_object_transform_recursive(self.root, Mat4::IDENTITY, false);
    }

    fn update_object_transform_recursive(
        &self,
        object_id: ObjectId,
        parent_world_matrix: Mat4,
        parent_changed: bool,
    ) {
        let Some(object) = self.objects.get(object_id) else {
            return;
        };

        let changed = parent_changed || object.transform.is_world_dirty();
        if changed {
            let world_matrix = parent_world_matrix * object.transform.local_matrix();
            object.transform.set_world_matrix(world_matrix);
        }

        let world_matrix = object.transform.world_matrix();
        for &child_id in &object.child_ids {
            self.update_object_transform_recursive(child_id, world_matrix, changed);
        }
    }

    /// World-space box of every mesh under the root. Always derived from the
    /// current transforms, never cached.
    pub fn bounding_box(&self) -> AABB {
        self.update_world_matrices();

        self.mesh_objects()
            .fold(AABB::EMPTY, |bounds, (object, mesh)| {
                bounds.union(&mesh.bounds().transformed(&object.transform.world_matrix()))
            })
    }

    /// Objects that carry a mesh, paired with that mesh.
    pub fn mesh_objects(&self) -> impl Iterator<Item = (&Object3D, &Mesh)> + '_ {
        self.objects.iter().filter_map(|(_, object)| {
            object
                .mesh_id
                .and_then(|mesh_id| self.meshes.get(mesh_id))
                .map(|mesh| (object, mesh))
        })
    }

    /// Joint palette of a skin: joint world matrix times inverse bind matrix.
    pub fn joint_matrices(&self, skin_id: SkinId) -> Vec<Mat4> {
        let Some(skin) = self.skins.get(skin_id) else {
            return Vec::new();
        };

        skin.joints
            .iter()
            .enumerate()
            .map(|(i, &joint)| {
                let inverse_bind = skin.inverse_bind.get(i).copied().unwrap_or(Mat4::IDENTITY);
                self.world_matrix(joint) * inverse_bind
            })
            .collect()
    }

    pub fn stats(&self) -> ModelStats {
        self.mesh_objects()
            .fold(ModelStats::default(), |stats, (_, mesh)| ModelStats {
                vertices: stats.vertices + mesh.vertex_count(),
                faces: stats.faces + mesh.face_count(),
            })
    }
}
