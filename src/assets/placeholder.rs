use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use super::LoadedAsset;
use crate::model::{Material, Mesh, MeshPrimitive, Vertex};
use crate::scene_graph::{Object3D, SceneModel};

pub const PLACEHOLDER_NAME: &str = "Demo Model";

/// Shown at startup without a model and whenever a load fails: a cube
/// ringed by four spheres. Kept at its authored size.
pub fn demo_model() -> LoadedAsset {
    let mut model = SceneModel::new(PLACEHOLDER_NAME);

    let cube = model.add_mesh(Mesh::new(
        "Cube",
        vec![cuboid(
            Vec3::splat(2.0),
            Material::from_color("Cube", 0x00d4ff, 0.7, 0.3),
        )],
    ));
    let cube_object = model.add_object(Object3D::named("Cube"), None);
    if let Some(object) = model.get_object_mut(cube_object) {
        object.mesh_id = Some(cube);
    }

    let sphere = model.add_mesh(Mesh::new(
        "Sphere",
        vec![uv_sphere(
            0.3,
            32,
            32,
            Material::from_color("Sphere", 0xff00ff, 0.8, 0.2),
        )],
    ));
    for i in 0..4 {
        let angle = i as f32 / 4.0 * TAU;
        let object_id = model.add_object(Object3D::named(format!("Sphere {}", i + 1)), None);
        if let Some(object) = model.get_object_mut(object_id) {
            object.mesh_id = Some(sphere);
        }
        model.set_object_translation(object_id, Vec3::new(angle.cos() * 2.0, 0.0, angle.sin() * 2.0));
    }

    LoadedAsset {
        name: PLACEHOLDER_NAME.to_string(),
        model,
        clips: Vec::new(),
    }
}

/// Axis aligned box centered at the origin with flat shaded faces.
pub fn cuboid(size: Vec3, material: Material) -> MeshPrimitive {
    let half = size / 2.0;
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            vertices.push(Vertex {
                position: (normal + u * su + v * sv) * half,
                normal,
                tex_coords: Vec2::new((su + 1.0) / 2.0, (1.0 - sv) / 2.0),
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshPrimitive::new(vertices, indices, material)
}

/// Latitude/longitude sphere with `width_segments` around and
/// `height_segments` from pole to pole.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32, material: Material) -> MeshPrimitive {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let row_length = width_segments + 1;

    let mut vertices = Vec::with_capacity((row_length * (height_segments + 1)) as usize);
    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        let polar = v * PI;

        for x in 0..=width_segments {
            let u = x as f32 / width_segments as f32;
            let azimuth = u * TAU;

            let normal = Vec3::new(
                -azimuth.cos() * polar.sin(),
                polar.cos(),
                azimuth.sin() * polar.sin(),
            );
            vertices.push(Vertex {
                position: normal * radius,
                normal,
                tex_coords: Vec2::new(u, v),
            });
        }
    }

    let mut indices = Vec::new();
    for y in 0..height_segments {
        for x in 0..width_segments {
            let a = y * row_length + x + 1;
            let b = y * row_length + x;
            let c = (y + 1) * row_length + x;
            let d = (y + 1) * row_length + x + 1;

            if y != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if y != height_segments - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    MeshPrimitive::new(vertices, indices, material)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_model_spans_cube_and_ring() {
        let asset = demo_model();
        let bounds = asset.model.bounding_box();

        assert!((bounds.min - Vec3::new(-2.3, -1.0, -2.3)).length() < 1e-4);
        assert!((bounds.max - Vec3::new(2.3, 1.0, 2.3)).length() < 1e-4);
        assert!(asset.clips.is_empty());
        assert_eq!(asset.model.mesh_objects().count(), 5);
    }

    #[test]
    fn cuboid_winding_matches_normals() {
        let primitive = cuboid(Vec3::ONE, Material::default());
        assert_eq!(primitive.vertices.len(), 24);
        assert_eq!(primitive.face_count(), 12);

        for triangle in primitive.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| primitive.vertices[triangle[i] as usize]);
            let winding = (b.position - a.position).cross(c.position - a.position).normalize();
            assert!((winding - a.normal).length() < 1e-5);
        }
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let primitive = uv_sphere(0.3, 32, 32, Material::default());

        assert_eq!(primitive.vertices.len(), 33 * 33);
        assert_eq!(primitive.face_count(), 32 * 31 * 2);
        assert!(primitive
            .vertices
            .iter()
            .all(|vertex| (vertex.position.length() - 0.3).abs() < 1e-5));
    }
}
