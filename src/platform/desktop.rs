//! Platform capabilities of a desktop window.
//!
//! Desktop builds carry no XR runtime. With `--emulate-handheld` the window
//! pretends to be a phone: the stereo view becomes available and the
//! keyboard stands in for the orientation sensor.

use std::sync::Arc;

use winit::keyboard::KeyCode;
use winit::window::{Fullscreen, Window};

use super::{
    DisplayPlatform, ImmersiveKind, ImmersivePlatform, ImmersiveSession, OrientationSample, OrientationSource,
    PermissionState, SessionFeatures,
};
use crate::error::{PlatformError, SessionError};

/// Degrees per key press.
const KEY_STEP: f32 = 5.0;

/// Keyboard driven stand-in for a device orientation sensor. Arrow keys turn
/// and tilt, Q and E roll, R recenters.
#[derive(Debug, Default)]
pub struct OrientationEmulator {
    listening: bool,
    current: OrientationSample,
    pending: Vec<OrientationSample>,
}

impl OrientationEmulator {
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        if !self.listening {
            return false;
        }

        let sample = &mut self.current;
        match key {
            KeyCode::ArrowLeft => sample.alpha += KEY_STEP,
            KeyCode::ArrowRight => sample.alpha -= KEY_STEP,
            KeyCode::ArrowUp => sample.beta = (sample.beta + KEY_STEP).min(90.0),
            KeyCode::ArrowDown => sample.beta = (sample.beta - KEY_STEP).max(-90.0),
            KeyCode::KeyQ => sample.gamma -= KEY_STEP,
            KeyCode::KeyE => sample.gamma += KEY_STEP,
            KeyCode::KeyR => *sample = OrientationSample::default(),
            _ => return false,
        }

        sample.alpha = sample.alpha.rem_euclid(360.0);
        sample.gamma = sample.gamma.clamp(-90.0, 90.0);
        self.pending.push(*sample);
        true
    }
}

impl OrientationSource for OrientationEmulator {
    fn requires_permission(&self) -> bool {
        false
    }

    fn request_permission(&mut self) -> PermissionState {
        PermissionState::Granted
    }

    fn add_listener(&mut self) {
        self.listening = true;
        self.pending.push(self.current);
    }

    fn remove_listener(&mut self) {
        self.listening = false;
        self.pending.clear();
    }

    fn drain_samples(&mut self) -> Vec<OrientationSample> {
        std::mem::take(&mut self.pending)
    }
}

pub struct DesktopPlatform {
    window: Option<Arc<Window>>,
    emulate_handheld: bool,
    pub orientation: OrientationEmulator,
}

impl DesktopPlatform {
    pub fn new(emulate_handheld: bool) -> Self {
        Self {
            window: None,
            emulate_handheld,
            orientation: OrientationEmulator::default(),
        }
    }

    pub fn attach_window(&mut self, window: Arc<Window>) {
        self.window = Some(window);
    }

    pub fn is_fullscreen(&self) -> bool {
        self.window
            .as_ref()
            .is_some_and(|window| window.fullscreen().is_some())
    }
}

impl ImmersivePlatform for DesktopPlatform {
    fn is_session_supported(&self, _kind: ImmersiveKind) -> bool {
        false
    }

    fn request_session(
        &mut self,
        kind: ImmersiveKind,
        _features: &SessionFeatures,
    ) -> Result<Box<dyn ImmersiveSession>, SessionError> {
        Err(SessionError::Rejected(format!("no {kind} runtime on this system")))
    }
}

impl OrientationSource for DesktopPlatform {
    fn requires_permission(&self) -> bool {
        self.orientation.requires_permission()
    }

    fn request_permission(&mut self) -> PermissionState {
        self.orientation.request_permission()
    }

    fn add_listener(&mut self) {
        self.orientation.add_listener();
    }

    fn remove_listener(&mut self) {
        self.orientation.remove_listener();
    }

    fn drain_samples(&mut self) -> Vec<OrientationSample> {
        self.orientation.drain_samples()
    }
}

impl DisplayPlatform for DesktopPlatform {
    fn is_handheld(&self) -> bool {
        self.emulate_handheld
    }

    fn request_fullscreen(&mut self) -> bool {
        let Some(window) = &self.window else {
            return false;
        };
        if window.fullscreen().is_some() {
            return false;
        }

        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        true
    }

    fn exit_fullscreen(&mut self) {
        if let Some(window) = &self.window {
            window.set_fullscreen(None);
        }
    }

    fn screen_size(&self) -> (u32, u32) {
        let Some(window) = &self.window else {
            return (0, 0);
        };

        let size = window
            .current_monitor()
            .map(|monitor| monitor.size())
            .unwrap_or_else(|| window.inner_size());
        (size.width, size.height)
    }

    fn container_size(&self) -> (u32, u32) {
        self.window
            .as_ref()
            .map(|window| {
                let size = window.inner_size();
                (size.width, size.height)
            })
            .unwrap_or((0, 0))
    }

    fn lock_landscape(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable("screen orientation lock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emulator_only_reacts_while_listening() {
        let mut emulator = OrientationEmulator::default();
        assert!(!emulator.handle_key(KeyCode::ArrowLeft));
        assert!(emulator.drain_samples().is_empty());

        emulator.add_listener();
        assert_eq!(emulator.drain_samples(), vec![OrientationSample::default()]);

        assert!(emulator.handle_key(KeyCode::ArrowLeft));
        assert!(emulator.handle_key(KeyCode::ArrowUp));
        assert!(!emulator.handle_key(KeyCode::KeyW));

        let samples = emulator.drain_samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1], OrientationSample { alpha: 5.0, beta: 5.0, gamma: 0.0 });

        emulator.remove_listener();
        assert!(!emulator.is_listening());
        assert!(!emulator.handle_key(KeyCode::ArrowLeft));
    }

    #[test]
    fn yaw_wraps_and_pitch_is_limited() {
        let mut emulator = OrientationEmulator::default();
        emulator.add_listener();

        emulator.handle_key(KeyCode::ArrowRight);
        for _ in 0..40 {
            emulator.handle_key(KeyCode::ArrowDown);
        }

        let last = emulator.drain_samples().pop().unwrap_or_default();
        assert_eq!(last.alpha, 355.0);
        assert_eq!(last.beta, -90.0);
    }

    #[test]
    fn desktop_without_window_offers_no_modes() {
        let mut platform = DesktopPlatform::new(false);

        assert!(!platform.is_session_supported(ImmersiveKind::Vr));
        assert!(platform
            .request_session(ImmersiveKind::Ar, &SessionFeatures::default())
            .is_err());
        assert!(!platform.request_fullscreen());
        assert_eq!(platform.container_size(), (0, 0));
        assert!(platform.lock_landscape().is_err());
    }
}
