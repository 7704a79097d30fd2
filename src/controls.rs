use std::f32::consts::PI;

use glam::Vec3;

use crate::camera::Camera;
use crate::config::OrbitConfig;

const MIN_POLAR: f32 = 1e-4;

/// Mouse driven orbit around a target point, with damped inertia.
pub struct OrbitControls {
    pub target: Vec3,
    pub config: OrbitConfig,

    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vec3,
}

impl OrbitControls {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            target: Vec3::ZERO,
            config,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }

    /// Moves the orbit center and drops any motion still in flight.
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    /// Pointer drag in pixels on a viewport `viewport_height` pixels tall.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        self.delta_theta -= 2.0 * PI * dx / height * self.config.rotate_speed;
        self.delta_phi -= 2.0 * PI * dy / height * self.config.rotate_speed;
    }

    /// Positive steps zoom in.
    pub fn zoom(&mut self, steps: f32) {
        let factor = 0.95f32.powf(self.config.zoom_speed);
        self.scale *= factor.powf(steps);
    }

    pub fn pan(&mut self, dx: f32, dy: f32, viewport_height: f32, camera: &Camera) {
        let height = viewport_height.max(1.0);
        let distance = (camera.position - self.target).length() * (camera.fov_y_radians() / 2.0).tan();

        let right = camera.rotation * Vec3::X;
        let up = camera.rotation * Vec3::Y;

        self.pan_offset -= right * (2.0 * dx * distance / height * self.config.pan_speed);
        self.pan_offset += up * (2.0 * dy * distance / height * self.config.pan_speed);
    }

    /// Applies accumulated input to the camera and decays it.
    pub fn update(&mut self, camera: &mut Camera) {
        let damping = self.config.damping_factor.clamp(0.0, 1.0);
        let damped = damping > 0.0;
        let step = if damped { damping } else { 1.0 };

        let offset = camera.position - self.target;
        let radius = offset.length();
        let (mut theta, mut phi) = if radius > 0.0 {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, PI / 2.0)
        };

        theta += self.delta_theta * step;
        phi = (phi + self.delta_phi * step).clamp(MIN_POLAR, PI - MIN_POLAR);

        let radius = (radius * self.scale).clamp(self.config.min_distance, self.config.max_distance);

        self.target += self.pan_offset * step;

        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = self.target + offset;
        camera.look_at(self.target);

        if damped {
            self.delta_theta *= 1.0 - damping;
            self.delta_phi *= 1.0 - damping;
            self.pan_offset *= 1.0 - damping;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn undamped() -> OrbitControls {
        OrbitControls::new(OrbitConfig {
            damping_factor: 0.0,
            ..Default::default()
        })
    }

    #[test]
    fn distance_is_clamped() {
        let mut controls = undamped();
        let mut camera = Camera::new(1.0);

        controls.zoom(-200.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - 50.0).abs() < 1e-3);

        controls.zoom(500.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn update_keeps_camera_facing_target() {
        let mut controls = undamped();
        let mut camera = Camera::new(1.0);
        controls.set_target(Vec3::new(0.0, 4.0, 0.0));

        controls.rotate(120.0, 30.0, 600.0);
        controls.update(&mut camera);

        let expected = (controls.target - camera.position).normalize();
        assert!((camera.forward() - expected).length() < 1e-4);
    }

    #[test]
    fn damped_rotation_settles() {
        let mut controls = OrbitControls::new(OrbitConfig::default());
        let mut camera = Camera::new(1.0);

        controls.rotate(300.0, 0.0, 600.0);
        for _ in 0..400 {
            controls.update(&mut camera);
        }
        let settled = camera.position;
        controls.update(&mut camera);

        assert!((camera.position - settled).length() < 1e-4);
        let distance = crate::camera::DEFAULT_POSITION.length();
        assert!((camera.position.length() - distance).abs() < 1e-3);
    }
}
