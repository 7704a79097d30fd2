//! Device capabilities the viewer consumes: native immersive sessions,
//! orientation sensors and display control.

pub mod desktop;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PlatformError, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmersiveKind {
    Vr,
    Ar,
}

impl fmt::Display for ImmersiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImmersiveKind::Vr => write!(f, "VR"),
            ImmersiveKind::Ar => write!(f, "AR"),
        }
    }
}

/// Coordinate system poses are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpace {
    LocalFloor,
    BoundedFloor,
    Local,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionFeature {
    Space(ReferenceSpace),
    HitTest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFeatures {
    pub required: Vec<SessionFeature>,
    pub optional: Vec<SessionFeature>,
}

impl SessionFeatures {
    pub fn required(features: impl IntoIterator<Item = SessionFeature>) -> Self {
        Self {
            required: features.into_iter().collect(),
            optional: Vec::new(),
        }
    }

    pub fn with_optional(mut self, features: impl IntoIterator<Item = SessionFeature>) -> Self {
        self.optional.extend(features);
        self
    }
}

/// Shared flag a session raises when it ends, whoever ended it.
#[derive(Debug, Clone, Default)]
pub struct SessionEndListener(Arc<AtomicBool>);

impl SessionEndListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn has_fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub trait ImmersiveSession {
    fn reference_space(&self) -> ReferenceSpace;
    /// Must be attached before the session is used so that every end path
    /// reaches the listener.
    fn set_end_listener(&mut self, listener: SessionEndListener);
    fn end(&mut self);
}

pub trait ImmersivePlatform {
    fn is_session_supported(&self, kind: ImmersiveKind) -> bool;
    fn request_session(
        &mut self,
        kind: ImmersiveKind,
        features: &SessionFeatures,
    ) -> Result<Box<dyn ImmersiveSession>, SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
}

/// Raw device orientation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationSample {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

pub trait OrientationSource {
    fn requires_permission(&self) -> bool;
    fn request_permission(&mut self) -> PermissionState;
    fn add_listener(&mut self);
    fn remove_listener(&mut self);
    /// Samples received since the last drain, oldest first.
    fn drain_samples(&mut self) -> Vec<OrientationSample>;
}

pub trait DisplayPlatform {
    fn is_handheld(&self) -> bool;
    /// Returns `true` when the switch completes asynchronously and will be
    /// confirmed later; `false` when it already took effect.
    fn request_fullscreen(&mut self) -> bool;
    fn exit_fullscreen(&mut self);
    fn screen_size(&self) -> (u32, u32);
    fn container_size(&self) -> (u32, u32);
    fn lock_landscape(&mut self) -> Result<(), PlatformError>;
}

pub trait Platform: ImmersivePlatform + OrientationSource + DisplayPlatform {}

impl<T: ImmersivePlatform + OrientationSource + DisplayPlatform + ?Sized> Platform for T {}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    struct FakeSession {
        reference_space: ReferenceSpace,
        listener: Rc<RefCell<Option<SessionEndListener>>>,
    }

    impl ImmersiveSession for FakeSession {
        fn reference_space(&self) -> ReferenceSpace {
            self.reference_space
        }

        fn set_end_listener(&mut self, listener: SessionEndListener) {
            *self.listener.borrow_mut() = Some(listener);
        }

        fn end(&mut self) {
            if let Some(listener) = self.listener.borrow().as_ref() {
                listener.notify();
            }
        }
    }

    /// Scriptable platform that records what the viewer asked of it.
    pub struct FakePlatform {
        pub vr_supported: bool,
        pub ar_supported: bool,
        pub handheld: bool,
        /// Number of upcoming session requests to reject.
        pub rejections: usize,
        pub requests: Vec<(ImmersiveKind, SessionFeatures)>,
        pub requires_permission: bool,
        pub permission: PermissionState,
        pub orientation_listeners: i32,
        pub pending_samples: Vec<OrientationSample>,
        pub fullscreen_is_async: bool,
        pub fullscreen: bool,
        pub screen: (u32, u32),
        pub container: (u32, u32),
        session_listener: Rc<RefCell<Option<SessionEndListener>>>,
    }

    impl FakePlatform {
        pub fn desktop_with_xr() -> Self {
            Self {
                vr_supported: true,
                ar_supported: true,
                handheld: false,
                rejections: 0,
                requests: Vec::new(),
                requires_permission: false,
                permission: PermissionState::Granted,
                orientation_listeners: 0,
                pending_samples: Vec::new(),
                fullscreen_is_async: false,
                fullscreen: false,
                screen: (1920, 1080),
                container: (1280, 720),
                session_listener: Rc::new(RefCell::new(None)),
            }
        }

        pub fn handheld() -> Self {
            Self {
                vr_supported: false,
                ar_supported: false,
                handheld: true,
                fullscreen_is_async: true,
                screen: (390, 844),
                container: (390, 600),
                ..Self::desktop_with_xr()
            }
        }

        /// Ends the current session from the device side.
        pub fn end_session_externally(&self) {
            if let Some(listener) = self.session_listener.borrow().as_ref() {
                listener.notify();
            }
        }
    }

    impl ImmersivePlatform for FakePlatform {
        fn is_session_supported(&self, kind: ImmersiveKind) -> bool {
            match kind {
                ImmersiveKind::Vr => self.vr_supported,
                ImmersiveKind::Ar => self.ar_supported,
            }
        }

        fn request_session(
            &mut self,
            kind: ImmersiveKind,
            features: &SessionFeatures,
        ) -> Result<Box<dyn ImmersiveSession>, SessionError> {
            self.requests.push((kind, features.clone()));

            if self.rejections > 0 {
                self.rejections -= 1;
                return Err(SessionError::Rejected("feature not granted".into()));
            }

            let reference_space = features
                .required
                .iter()
                .chain(&features.optional)
                .find_map(|feature| match feature {
                    SessionFeature::Space(space) => Some(*space),
                    SessionFeature::HitTest => None,
                })
                .unwrap_or(ReferenceSpace::LocalFloor);

            *self.session_listener.borrow_mut() = None;
            Ok(Box::new(FakeSession {
                reference_space,
                listener: self.session_listener.clone(),
            }))
        }
    }

    impl OrientationSource for FakePlatform {
        fn requires_permission(&self) -> bool {
            self.requires_permission
        }

        fn request_permission(&mut self) -> PermissionState {
            self.permission
        }

        fn add_listener(&mut self) {
            self.orientation_listeners += 1;
        }

        fn remove_listener(&mut self) {
            self.orientation_listeners -= 1;
        }

        fn drain_samples(&mut self) -> Vec<OrientationSample> {
            std::mem::take(&mut self.pending_samples)
        }
    }

    impl DisplayPlatform for FakePlatform {
        fn is_handheld(&self) -> bool {
            self.handheld
        }

        fn request_fullscreen(&mut self) -> bool {
            self.fullscreen = true;
            self.fullscreen_is_async
        }

        fn exit_fullscreen(&mut self) {
            self.fullscreen = false;
        }

        fn screen_size(&self) -> (u32, u32) {
            self.screen
        }

        fn container_size(&self) -> (u32, u32) {
            self.container
        }

        fn lock_landscape(&mut self) -> Result<(), PlatformError> {
            Err(PlatformError::Unavailable("orientation lock"))
        }
    }
}
