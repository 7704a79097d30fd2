use std::collections::HashMap;
use std::mem::offset_of;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use wgpu::util::DeviceExt;

use crate::model::{Material, MeshId, MeshPrimitive, Vertex};
use crate::rendering::instance::Instance;
use crate::rendering::texture::Texture;
use crate::scene_graph::{ObjectId, SceneModel};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct MaterialUniform {
    base_color: Vec4,
    /// metallic, roughness, has texture, unused
    params: Vec4,
}

impl MaterialUniform {
    fn new(material: &Material) -> Self {
        let has_texture = if material.base_color_texture.is_some() { 1.0 } else { 0.0 };

        Self {
            base_color: material.base_color,
            params: Vec4::new(material.metallic, material.roughness, has_texture, 0.0),
        }
    }
}

/// Shared GPU state needed to upload materials.
pub struct MaterialResources {
    pub layout: wgpu::BindGroupLayout,
    pub fallback_texture: Texture,
}

impl MaterialResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Self {
            layout,
            fallback_texture: Texture::white(device, queue),
        }
    }
}

pub struct RenderPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
    pub material_bind_group: wgpu::BindGroup,
}

pub struct RenderMesh {
    pub primitives: Vec<RenderPrimitive>,
}

struct Draw {
    object_id: ObjectId,
    mesh_id: MeshId,
    skinned: bool,
}

/// GPU copy of one `SceneModel`. Rebuilt whenever the displayed model
/// changes identity.
pub struct RenderModel {
    model_id: u64,
    meshes: HashMap<MeshId, RenderMesh>,
    /// Deformed vertex buffers of skinned objects, one per primitive.
    skinned_buffers: HashMap<ObjectId, Vec<wgpu::Buffer>>,
    draws: Vec<Draw>,
    _textures: Vec<Arc<Texture>>,
}

impl RenderModel {
    pub fn from_model(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        materials: &MaterialResources,
        model: &SceneModel,
    ) -> Self {
        let mut textures: HashMap<usize, Arc<Texture>> = HashMap::new();

        let meshes = model
            .meshes
            .iter()
            .map(|(mesh_id, mesh)| {
                let primitives = mesh
                    .primitives
                    .iter()
                    .enumerate()
                    .map(|(index, primitive)| {
                        let label = format!("{} ({}, primitive {})", model.name, mesh.name, index);
                        upload_primitive(device, queue, materials, &mut textures, primitive, &label)
                    })
                    .collect();

                (mesh_id, RenderMesh { primitives })
            })
            .collect();

        let mut skinned_buffers = HashMap::new();
        for (object_id, object) in model.objects.iter() {
            let (Some(_), Some(mesh)) = (object.skin_id, object.mesh_id.and_then(|id| model.meshes.get(id)))
            else {
                continue;
            };
            if !mesh.primitives.iter().any(MeshPrimitive::is_skinned) {
                continue;
            }

            let buffers = mesh
                .primitives
                .iter()
                .map(|primitive| {
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("Skinned vertex buffer ({})", object.name)),
                        contents: bytemuck::cast_slice(&primitive.vertices),
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    })
                })
                .collect();
            skinned_buffers.insert(object_id, buffers);
        }

        log::debug!(
            "Uploaded model {} ({} meshes, {} skinned objects)",
            model.name,
            model.meshes.len(),
            skinned_buffers.len()
        );

        Self {
            model_id: model.id(),
            meshes,
            skinned_buffers,
            draws: Vec::new(),
            _textures: textures.into_values().collect(),
        }
    }

    pub fn model_id(&self) -> u64 {
        self.model_id
    }

    /// Collects this frame's instances and refreshes skinned vertices.
    pub fn prepare(&mut self, queue: &wgpu::Queue, model: &SceneModel, instances: &mut Vec<Instance>) {
        model.update_world_matrices();
        self.draws.clear();
        instances.clear();

        for (object_id, object) in model.objects.iter() {
            let Some(mesh_id) = object.mesh_id else {
                continue;
            };
            let Some(mesh) = model.meshes.get(mesh_id) else {
                continue;
            };

            let skinned = match (object.skin_id, self.skinned_buffers.get(&object_id)) {
                (Some(skin_id), Some(buffers)) => {
                    let joint_matrices = model.joint_matrices(skin_id);
                    for (primitive, buffer) in mesh.primitives.iter().zip(buffers) {
                        let vertices = primitive.skinned_vertices(&joint_matrices);
                        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&vertices));
                    }
                    true
                }
                _ => false,
            };

            // Skinned vertices already are in world space.
            let world = if skinned {
                Mat4::IDENTITY
            } else {
                object.transform.world_matrix()
            };
            instances.push(Instance::from_world_matrix(world));

            self.draws.push(Draw {
                object_id,
                mesh_id,
                skinned,
            });
        }
    }

    /// Issues one draw per prepared instance. The caller binds pipelines and
    /// the instance buffer.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        for (instance_index, draw) in self.draws.iter().enumerate() {
            let Some(mesh) = self.meshes.get(&draw.mesh_id) else {
                continue;
            };
            let skinned = draw
                .skinned
                .then(|| self.skinned_buffers.get(&draw.object_id))
                .flatten();

            let instance = instance_index as u32;
            for (index, primitive) in mesh.primitives.iter().enumerate() {
                let vertex_buffer = skinned
                    .and_then(|buffers| buffers.get(index))
                    .unwrap_or(&primitive.vertex_buffer);

                render_pass.set_bind_group(1, &primitive.material_bind_group, &[]);
                render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..primitive.num_indices, 0, instance..instance + 1);
            }
        }
    }
}

fn upload_primitive(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    materials: &MaterialResources,
    textures: &mut HashMap<usize, Arc<Texture>>,
    primitive: &MeshPrimitive,
    label: &str,
) -> RenderPrimitive {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("Vertex buffer {label}")),
        contents: bytemuck::cast_slice(&primitive.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });

    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("Index buffer {label}")),
        contents: bytemuck::cast_slice(&primitive.indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    let material = &primitive.material;
    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("Material uniform {}", material.name)),
        contents: bytemuck::bytes_of(&MaterialUniform::new(material)),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    let texture = material.base_color_texture.as_ref().map(|data| {
        textures
            .entry(Arc::as_ptr(data) as usize)
            .or_insert_with(|| Arc::new(Texture::from_data(device, queue, data, &material.name)))
            .clone()
    });
    let texture = texture.as_deref().unwrap_or(&materials.fallback_texture);

    let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("Material bind group {}", material.name)),
        layout: &materials.layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
    });

    RenderPrimitive {
        vertex_buffer,
        index_buffer,
        num_indices: primitive.indices.len() as u32,
        material_bind_group,
    }
}

pub const RENDER_MODEL_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, tex_coords) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ],
};
