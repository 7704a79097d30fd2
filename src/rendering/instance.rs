use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};
use wgpu::BufferUsages;

/// Per-object data streamed next to the vertex buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Instance {
    pub model: Mat4,
    /// Inverse transpose of the upper 3x3, padded to vec4 columns.
    pub normal: [Vec4; 3],
}

impl Instance {
    pub fn from_world_matrix(world: Mat4) -> Self {
        let normal = Mat3::from_mat4(world).inverse().transpose();
        let normal = if normal.is_finite() { normal } else { Mat3::IDENTITY };

        Self {
            model: world,
            normal: [
                normal.x_axis.extend(0.0),
                normal.y_axis.extend(0.0),
                normal.z_axis.extend(0.0),
            ],
        }
    }
}

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
    3 => Float32x4,
    4 => Float32x4,
    5 => Float32x4,
    6 => Float32x4,
    7 => Float32x4,
    8 => Float32x4,
    9 => Float32x4,
];

pub const INSTANCE_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Instance>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &INSTANCE_ATTRIBUTES,
};

pub struct InstanceBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    label: String,
}

impl InstanceBuffer {
    const INITIAL_CAPACITY: u64 = 128;

    pub fn new(device: &wgpu::Device, name: impl Into<String>) -> Self {
        let label = format!("Instance buffer ({})", name.into());
        let buffer = Self::create(device, &label, Self::INITIAL_CAPACITY);

        Self {
            buffer,
            capacity: Self::INITIAL_CAPACITY,
            label,
        }
    }

    fn create(device: &wgpu::Device, label: &str, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<Instance>() as u64 * capacity,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Uploads `instances`, reallocating when they no longer fit.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, instances: &[Instance]) {
        let needed = instances.len() as u64;
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            self.buffer = Self::create(device, &self.label, self.capacity);
        }

        if !instances.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(instances));
        }
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(1, self.buffer.slice(..));
    }
}
