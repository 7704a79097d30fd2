use glam::{Mat4, Quat, Vec3, Vec4};
use wgpu::util::DeviceExt;

pub const DEFAULT_FOV_DEGREES: f32 = 45.0;
pub const DEFAULT_POSITION: Vec3 = Vec3::new(5.0, 3.0, 5.0);

/// Right-handed perspective camera looking down its local -Z axis.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        let mut camera = Self {
            position: DEFAULT_POSITION,
            rotation: Quat::IDENTITY,
            up: Vec3::Y,
            fov_y_degrees: DEFAULT_FOV_DEGREES,
            aspect,
            near: 0.1,
            far: 1000.0,
        };
        camera.look_at(Vec3::ZERO);
        camera
    }

    pub fn fov_y_radians(&self) -> f32 {
        self.fov_y_degrees.to_radians()
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Rotates the camera so that it faces `target`. Does nothing when the
    /// target coincides with the camera position.
    pub fn look_at(&mut self, target: Vec3) {
        let direction = target - self.position;
        if direction.length_squared() <= f32::EPSILON {
            return;
        }

        let direction = direction.normalize();
        if direction.cross(self.up).length_squared() <= 1e-10 {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, direction);
            return;
        }

        let view = Mat4::look_at_rh(self.position, target, self.up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.rotation = rotation.normalize();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
    position: Vec4,
}

impl CameraUniform {
    pub fn update(&mut self, camera: &Camera) {
        self.view_proj = camera.view_projection_matrix();
        self.position = camera.position.extend(1.0);
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn update_buffer(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*self]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_points_forward_at_target() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(3.0, 2.0, -4.0);
        let target = Vec3::new(-1.0, 0.5, 2.0);
        camera.look_at(target);

        let expected = (target - camera.position).normalize();
        assert!((camera.forward() - expected).length() < 1e-5);
    }

    #[test]
    fn look_at_straight_down_stays_finite() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(0.0, 10.0, 0.0);
        camera.look_at(Vec3::ZERO);

        assert!(camera.rotation.is_finite());
        assert!((camera.forward() - Vec3::NEG_Y).length() < 1e-5);
    }

    #[test]
    fn view_matrix_moves_camera_to_origin() {
        let camera = Camera::new(1.5);
        let eye = camera.view_matrix().transform_point3(camera.position);
        assert!(eye.length() < 1e-4);
    }
}
