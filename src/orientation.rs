use glam::{EulerRot, Quat};

use crate::camera::Camera;
use crate::platform::{OrientationSample, OrientationSource};

/// Camera rotation for a device orientation: yaw from alpha, pitch from beta
/// and roll from negated gamma, applied in intrinsic Y-X-Z order.
pub fn sample_rotation(sample: &OrientationSample) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        sample.alpha.to_radians(),
        sample.beta.to_radians(),
        (-sample.gamma).to_radians(),
    )
}

/// Drives the camera rotation from the device orientation sensor while
/// attached. Attach and detach are idempotent, so the source never holds more
/// than one listener for this tracker.
pub struct OrientationTracker {
    attached: bool,
    smoothing: Option<f32>,
}

impl OrientationTracker {
    pub fn new(smoothing: Option<f32>) -> Self {
        Self {
            attached: false,
            smoothing,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn attach<S: OrientationSource + ?Sized>(&mut self, source: &mut S) {
        if self.attached {
            return;
        }
        source.add_listener();
        self.attached = true;
        log::debug!("Orientation tracking attached");
    }

    pub fn detach<S: OrientationSource + ?Sized>(&mut self, source: &mut S) {
        if !self.attached {
            return;
        }
        source.remove_listener();
        self.attached = false;
        log::debug!("Orientation tracking detached");
    }

    /// Applies one sample to the camera. Ignored while detached.
    pub fn handle_sample(&mut self, sample: OrientationSample, camera: &mut Camera) {
        if !self.attached {
            return;
        }

        let rotation = sample_rotation(&sample);

        camera.rotation = match self.smoothing {
            Some(factor) => camera.rotation.slerp(rotation, factor.clamp(0.0, 1.0)).normalize(),
            None => rotation,
        };
    }

    /// Applies every sample received since the previous frame.
    pub fn pump<S: OrientationSource + ?Sized>(&mut self, source: &mut S, camera: &mut Camera) {
        if !self.attached {
            return;
        }

        for sample in source.drain_samples() {
            self.handle_sample(sample, camera);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::platform::PermissionState;

    #[derive(Default)]
    struct FakeSensor {
        listeners: i32,
        pending: Vec<OrientationSample>,
    }

    impl OrientationSource for FakeSensor {
        fn requires_permission(&self) -> bool {
            false
        }

        fn request_permission(&mut self) -> PermissionState {
            PermissionState::Granted
        }

        fn add_listener(&mut self) {
            self.listeners += 1;
        }

        fn remove_listener(&mut self) {
            self.listeners -= 1;
        }

        fn drain_samples(&mut self) -> Vec<OrientationSample> {
            std::mem::take(&mut self.pending)
        }
    }

    #[test]
    fn repeated_cycles_never_accumulate_listeners() {
        let mut sensor = FakeSensor::default();
        let mut tracker = OrientationTracker::new(None);

        for _ in 0..5 {
            tracker.attach(&mut sensor);
            tracker.attach(&mut sensor);
            assert_eq!(sensor.listeners, 1);

            tracker.detach(&mut sensor);
            tracker.detach(&mut sensor);
            assert_eq!(sensor.listeners, 0);
        }
    }

    #[test]
    fn samples_map_directly_to_rotation() {
        let mut sensor = FakeSensor::default();
        let mut tracker = OrientationTracker::new(None);
        let mut camera = Camera::new(1.0);
        tracker.attach(&mut sensor);

        sensor.pending = vec![
            OrientationSample {
                alpha: 10.0,
                beta: 20.0,
                gamma: 30.0,
            },
            OrientationSample {
                alpha: 90.0,
                beta: 0.0,
                gamma: 0.0,
            },
        ];
        tracker.pump(&mut sensor, &mut camera);

        let forward = camera.rotation * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_X).length() < 1e-5);
    }

    #[test]
    fn roll_is_negated_gamma() {
        let rotation = sample_rotation(&OrientationSample {
            alpha: 0.0,
            beta: 0.0,
            gamma: 90.0,
        });
        let expected = Quat::from_rotation_z(-std::f32::consts::FRAC_PI_2);
        assert!(rotation.angle_between(expected) < 1e-5);
    }

    #[test]
    fn detached_tracker_ignores_samples() {
        let mut tracker = OrientationTracker::new(None);
        let mut camera = Camera::new(1.0);
        let before = camera.rotation;

        tracker.handle_sample(
            OrientationSample {
                alpha: 45.0,
                ..Default::default()
            },
            &mut camera,
        );

        assert_eq!(camera.rotation, before);
    }
}
