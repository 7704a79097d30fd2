use id_arena::Id;

use crate::model::{MeshId, SkinId};
use crate::scene_graph::transform::Transform;

pub type ObjectId = Id<Object3D>;

pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub mesh_id: Option<MeshId>,
    pub skin_id: Option<SkinId>,
    pub parent_id: Option<ObjectId>,
    pub child_ids: Vec<ObjectId>,
}

impl Object3D {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for Object3D {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Transform::default(),
            mesh_id: None,
            skin_id: None,
            parent_id: None,
            child_ids: Vec::new(),
        }
    }
}
