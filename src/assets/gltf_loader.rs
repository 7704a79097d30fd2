use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::buffer;
use itertools::izip;

use super::{AssetLoader, AssetSource, LoadedAsset};
use crate::animation::{AnimationClip, Channel, Interpolation, Keyframes, Track};
use crate::error::LoadError;
use crate::model::{compute_normals, Material, Mesh, MeshId, MeshPrimitive, Skin, SkinWeights, TextureData, Vertex};
use crate::scene_graph::{Object3D, ObjectId, SceneModel};

pub type Buffers<'a> = &'a [buffer::Data];

/// glTF 2.0 in both the `.gltf` and binary `.glb` flavours.
pub struct GltfLoader;

impl AssetLoader for GltfLoader {
    fn load(&self, source: &AssetSource, progress: &mut dyn FnMut(u8)) -> Result<LoadedAsset, LoadError> {
        progress(0);

        let (document, buffers, images) = match source {
            AssetSource::Path(path) => gltf::import(path)?,
            AssetSource::Bytes { data, .. } => gltf::import_slice(data)?,
        };
        progress(40);

        let name = source.display_name();
        let mut builder = ModelBuilder::new(&name, &buffers, &images);

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or(LoadError::Empty)?;

        let node_count = scene.nodes().count().max(1);
        for (i, node) in scene.nodes().enumerate() {
            builder.spawn_node(&node, None);
            progress(40 + (40 * (i + 1) / node_count) as u8);
        }

        builder.attach_skins(&document);
        let clips = builder.read_animations(&document);
        progress(90);

        let model = builder.finish();
        if model.mesh_objects().next().is_none() {
            return Err(LoadError::Empty);
        }

        log::info!(
            "Loaded {} with {} meshes and {} animations",
            name,
            model.meshes.len(),
            clips.len()
        );
        progress(100);

        Ok(LoadedAsset { name, model, clips })
    }
}

struct ModelBuilder<'a> {
    model: SceneModel,
    buffers: Buffers<'a>,
    images: &'a [gltf::image::Data],
    node_to_object: HashMap<usize, ObjectId>,
    mesh_cache: HashMap<usize, MeshId>,
    texture_cache: HashMap<usize, Option<Arc<TextureData>>>,
}

impl<'a> ModelBuilder<'a> {
    fn new(name: &str, buffers: Buffers<'a>, images: &'a [gltf::image::Data]) -> Self {
        Self {
            model: SceneModel::new(name),
            buffers,
            images,
            node_to_object: HashMap::new(),
            mesh_cache: HashMap::new(),
            texture_cache: HashMap::new(),
        }
    }

    fn finish(self) -> SceneModel {
        self.model
    }

    fn spawn_node(&mut self, node: &gltf::Node, parent: Option<ObjectId>) -> ObjectId {
        let node_name = node
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("Node {}", node.index()));

        let mut object = Object3D::named(node_name.clone());
        let (translation, rotation, scale) = node.transform().decomposed();
        object.transform.set_transform(
            Vec3::from(translation),
            Quat::from_array(rotation),
            Vec3::from(scale),
        );

        if let Some(mesh) = node.mesh() {
            object.mesh_id = self.mesh(&mesh, &node_name);
        }

        let object_id = self.model.add_object(object, parent);
        self.node_to_object.insert(node.index(), object_id);

        for child in node.children() {
            self.spawn_node(&child, Some(object_id));
        }

        object_id
    }

    /// Meshes shared by several nodes are converted once.
    fn mesh(&mut self, mesh: &gltf::Mesh, node_name: &str) -> Option<MeshId> {
        if let Some(mesh_id) = self.mesh_cache.get(&mesh.index()) {
            return Some(*mesh_id);
        }

        let mesh_name = mesh
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("{} (Mesh)", node_name));

        let primitives: Vec<MeshPrimitive> = mesh
            .primitives()
            .filter_map(|primitive| self.primitive(&mesh_name, &primitive))
            .collect();

        if primitives.is_empty() {
            log::warn!("Mesh {} has no triangle primitives, skipping", mesh_name);
            return None;
        }

        let mesh_id = self.model.add_mesh(Mesh::new(mesh_name, primitives));
        self.mesh_cache.insert(mesh.index(), mesh_id);
        Some(mesh_id)
    }

    fn primitive(&mut self, mesh_name: &str, primitive: &gltf::Primitive) -> Option<MeshPrimitive> {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "Unsupported primitive mode {:?} in {}, skipping",
                primitive.mode(),
                mesh_name
            );
            return None;
        }

        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

        let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from).collect();
        let vertex_count = positions.len();

        let normals: Option<Vec<Vec3>> = reader
            .read_normals()
            .map(|normals| normals.map(Vec3::from).collect());
        let tex_coords: Vec<Vec2> = reader
            .read_tex_coords(0)
            .map(|coords| coords.into_f32().map(Vec2::from).collect())
            .unwrap_or_else(|| vec![Vec2::ZERO; vertex_count]);

        let mut vertices: Vec<Vertex> = izip!(
            positions.iter().copied(),
            normals
                .iter()
                .flatten()
                .copied()
                .chain(std::iter::repeat(Vec3::ZERO)),
            tex_coords.into_iter().chain(std::iter::repeat(Vec2::ZERO))
        )
        .map(|(position, normal, tex_coords)| Vertex {
            position,
            normal,
            tex_coords,
        })
        .collect();

        let indices: Vec<u32> = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect())
            .unwrap_or_else(|| (0..vertex_count as u32).collect());

        if normals.is_none() {
            compute_normals(&mut vertices, &indices);
        }

        let skin_weights = match (reader.read_joints(0), reader.read_weights(0)) {
            (Some(joints), Some(weights)) => Some(
                joints
                    .into_u16()
                    .zip(weights.into_f32())
                    .map(|(joints, weights)| SkinWeights { joints, weights })
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        };

        let material = self.material(&primitive.material());

        let mut mesh_primitive = MeshPrimitive::new(vertices, indices, material);
        mesh_primitive.skin_weights = skin_weights.filter(|weights| weights.len() == vertex_count);
        Some(mesh_primitive)
    }

    fn material(&mut self, material: &gltf::Material) -> Material {
        let pbr = material.pbr_metallic_roughness();
        let base_color_texture = pbr
            .base_color_texture()
            .and_then(|info| self.texture(info.texture().source().index()));

        Material {
            name: material.name().unwrap_or("Unnamed").to_string(),
            base_color: Vec4::from(pbr.base_color_factor()),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            base_color_texture,
        }
    }

    fn texture(&mut self, image_index: usize) -> Option<Arc<TextureData>> {
        if let Some(texture) = self.texture_cache.get(&image_index) {
            return texture.clone();
        }

        let texture = self.images.get(image_index).and_then(convert_image).map(Arc::new);
        self.texture_cache.insert(image_index, texture.clone());
        texture
    }

    fn attach_skins(&mut self, document: &gltf::Document) {
        let mut skin_ids = HashMap::new();

        for skin in document.skins() {
            let joints: Vec<ObjectId> = skin
                .joints()
                .filter_map(|joint| self.node_to_object.get(&joint.index()).copied())
                .collect();
            if joints.len() != skin.joints().count() {
                log::warn!("Skin {} references nodes outside the scene, skipping", skin.index());
                continue;
            }

            let buffers = self.buffers;
            let inverse_bind = skin
                .reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]))
                .read_inverse_bind_matrices()
                .map(|matrices| matrices.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);

            let skin_id = self.model.add_skin(Skin {
                joints,
                inverse_bind,
            });
            skin_ids.insert(skin.index(), skin_id);
        }

        for node in document.nodes() {
            let (Some(skin), Some(&object_id)) = (node.skin(), self.node_to_object.get(&node.index())) else {
                continue;
            };
            if let Some(object) = self.model.get_object_mut(object_id) {
                object.skin_id = skin_ids.get(&skin.index()).copied();
            }
        }
    }

    fn read_animations(&self, document: &gltf::Document) -> Vec<AnimationClip> {
        document
            .animations()
            .map(|animation| {
                let channels = animation
                    .channels()
                    .filter_map(|channel| self.channel(&channel))
                    .collect();
                AnimationClip::new(animation.name().unwrap_or(""), channels)
            })
            .collect()
    }

    fn channel(&self, channel: &gltf::animation::Channel) -> Option<Channel> {
        use gltf::animation::util::ReadOutputs;

        let target = *self.node_to_object.get(&channel.target().node().index())?;

        let buffers = self.buffers;
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));
        let times: Vec<f32> = reader.read_inputs()?.collect();

        let interpolation = channel.sampler().interpolation();
        let keyframe_interpolation = match interpolation {
            gltf::animation::Interpolation::Step => Interpolation::Step,
            _ => Interpolation::Linear,
        };
        let cubic = interpolation == gltf::animation::Interpolation::CubicSpline;

        let track = match reader.read_outputs()? {
            ReadOutputs::Translations(values) => Track::Translation(Keyframes::new(
                times,
                spline_values(values.map(Vec3::from).collect(), cubic),
                keyframe_interpolation,
            )),
            ReadOutputs::Rotations(values) => Track::Rotation(Keyframes::new(
                times,
                spline_values(
                    values.into_f32().map(|q| Quat::from_array(q).normalize()).collect(),
                    cubic,
                ),
                keyframe_interpolation,
            )),
            ReadOutputs::Scales(values) => Track::Scale(Keyframes::new(
                times,
                spline_values(values.map(Vec3::from).collect(), cubic),
                keyframe_interpolation,
            )),
            ReadOutputs::MorphTargetWeights(_) => return None,
        };

        Some(Channel { target, track })
    }
}

/// Cubic spline outputs store (in-tangent, value, out-tangent) triples; only
/// the values are kept and sampled linearly.
fn spline_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if !cubic {
        return values;
    }
    values.chunks_exact(3).map(|triple| triple[1]).collect()
}

fn convert_image(image: &gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;

    let pixels = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|c| [c[0], c[0], c[0], c[1]])
            .collect(),
        Format::R8 => image.pixels.iter().flat_map(|&r| [r, r, r, 255]).collect(),
        other => {
            log::warn!("Unsupported texture format {:?}, ignoring texture", other);
            return None;
        }
    };

    Some(TextureData {
        pixels,
        width: image.width,
        height: image.height,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Binary glTF with one triangle and a 1.5 second "Bounce" clip.
    pub(crate) fn bouncing_triangle_glb() -> Vec<u8> {
        let mut bin: Vec<u8> = Vec::new();
        for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&value.to_le_bytes());
        }
        for index in [0u16, 1, 2] {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]);
        for time in [0.0f32, 1.5] {
            bin.extend_from_slice(&time.to_le_bytes());
        }
        for value in [0.0f32, 0.0, 0.0, 0.0, 2.0, 0.0] {
            bin.extend_from_slice(&value.to_le_bytes());
        }
        assert_eq!(bin.len(), 76);

        let json = r#"{
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "Triangle", "mesh": 0 }],
            "meshes": [{ "name": "Tri", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
            "buffers": [{ "byteLength": 76 }],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 6 },
                { "buffer": 0, "byteOffset": 44, "byteLength": 8 },
                { "buffer": 0, "byteOffset": 52, "byteLength": 24 }
            ],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0] },
                { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
                { "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0], "max": [1.5] },
                { "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }
            ],
            "animations": [{
                "name": "Bounce",
                "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }],
                "samplers": [{ "input": 2, "output": 3, "interpolation": "LINEAR" }]
            }]
        }"#;

        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total_length = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total_length);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total_length as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn loads_mesh_and_clips_from_glb() {
        let source = AssetSource::Bytes {
            name: "Bounce.glb".into(),
            data: bouncing_triangle_glb(),
        };

        let mut reported = Vec::new();
        let asset = GltfLoader.load(&source, &mut |p| reported.push(p)).unwrap();

        assert_eq!(asset.name, "Bounce.glb");
        assert_eq!(asset.model.stats().vertices, 3);
        assert_eq!(asset.model.stats().faces, 1);
        assert!(asset
            .model
            .mesh_objects()
            .any(|(object, _)| object.name == "Triangle"));

        assert_eq!(asset.clips.len(), 1);
        assert_eq!(asset.clips[0].name, "Bounce");
        assert_eq!(asset.clips[0].duration, 1.5);

        assert_eq!(reported.first(), Some(&0));
        assert_eq!(reported.last(), Some(&100));
        assert!(reported.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn missing_normals_are_generated() {
        let source = AssetSource::Bytes {
            name: "Bounce.glb".into(),
            data: bouncing_triangle_glb(),
        };
        let asset = GltfLoader.load(&source, &mut |_| {}).unwrap();

        let (_, mesh) = asset.model.mesh_objects().next().unwrap();
        for vertex in &mesh.primitives[0].vertices {
            assert!((vertex.normal - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let source = AssetSource::Bytes {
            name: "broken.glb".into(),
            data: b"definitely not a model".to_vec(),
        };
        assert!(matches!(GltfLoader.load(&source, &mut |_| {}), Err(LoadError::Gltf(_))));
    }
}
