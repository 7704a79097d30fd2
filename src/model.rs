use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use id_arena::Id;

use crate::math::AABB;
use crate::scene_graph::ObjectId;

pub type MeshId = Id<Mesh>;
pub type SkinId = Id<Skin>;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

/// Up to four joint influences of a skinned vertex.
#[derive(Copy, Clone, Debug, Default)]
pub struct SkinWeights {
    pub joints: [u16; 4],
    pub weights: [f32; 4],
}

/// RGBA8 pixels of a decoded texture image.
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub base_color_texture: Option<Arc<TextureData>>,
}

impl Material {
    pub fn from_color(name: impl Into<String>, rgb: u32, metallic: f32, roughness: f32) -> Self {
        Self {
            name: name.into(),
            base_color: color_from_hex(rgb).extend(1.0),
            metallic,
            roughness,
            base_color_texture: None,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::from_color("Default", 0xcccccc, 0.0, 1.0)
    }
}

pub struct MeshPrimitive {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Material,
    pub skin_weights: Option<Vec<SkinWeights>>,
    pub bounds: AABB,
}

impl MeshPrimitive {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, material: Material) -> Self {
        let bounds = AABB::from_points(vertices.iter().map(|vertex| vertex.position));

        Self {
            vertices,
            indices,
            material,
            skin_weights: None,
            bounds,
        }
    }

    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_skinned(&self) -> bool {
        self.skin_weights.is_some()
    }

    /// Applies linear blend skinning with the given joint palette.
    ///
    /// Returns the bind pose unchanged when the primitive carries no weights.
    pub fn skinned_vertices(&self, joint_matrices: &[Mat4]) -> Vec<Vertex> {
        let Some(skin_weights) = &self.skin_weights else {
            return self.vertices.clone();
        };

        self.vertices
            .iter()
            .zip(skin_weights)
            .map(|(vertex, influence)| {
                let mut skin = Mat4::ZERO;
                let mut total_weight = 0.0;

                for (joint, weight) in influence.joints.iter().zip(influence.weights) {
                    if weight <= 0.0 {
                        continue;
                    }

                    if let Some(matrix) = joint_matrices.get(*joint as usize) {
                        skin += *matrix * weight;
                        total_weight += weight;
                    }
                }

                if total_weight <= f32::EPSILON {
                    return *vertex;
                }

                let skin = skin * (1.0 / total_weight);

                Vertex {
                    position: skin.transform_point3(vertex.position),
                    normal: skin.transform_vector3(vertex.normal).normalize_or_zero(),
                    tex_coords: vertex.tex_coords,
                }
            })
            .collect()
    }
}

pub struct Mesh {
    pub name: String,
    pub primitives: Vec<MeshPrimitive>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, primitives: Vec<MeshPrimitive>) -> Self {
        Self {
            name: name.into(),
            primitives,
        }
    }

    pub fn bounds(&self) -> AABB {
        self.primitives
            .iter()
            .fold(AABB::EMPTY, |bounds, primitive| bounds.union(&primitive.bounds))
    }

    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(|p| p.vertices.len()).sum()
    }

    pub fn face_count(&self) -> usize {
        self.primitives.iter().map(MeshPrimitive::face_count).sum()
    }
}

pub struct Skin {
    pub joints: Vec<ObjectId>,
    pub inverse_bind: Vec<Mat4>,
}

/// Area-weighted smooth normals for meshes that ship without them.
pub fn compute_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut normals = vec![Vec3::ZERO; vertices.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }

        let edge1 = vertices[b].position - vertices[a].position;
        let edge2 = vertices[c].position - vertices[a].position;
        let face_normal = edge1.cross(edge2);

        normals[a] += face_normal;
        normals[b] += face_normal;
        normals[c] += face_normal;
    }

    for (vertex, normal) in vertices.iter_mut().zip(normals) {
        vertex.normal = normal.normalize_or(Vec3::Y);
    }
}

pub fn color_from_hex(rgb: u32) -> Vec3 {
    Vec3::new(
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    )
}
