use std::fmt;

use glam::{Quat, Vec3};

use crate::camera::{Camera, DEFAULT_FOV_DEGREES};
use crate::config::ImmersiveConfig;
use crate::error::SessionError;
use crate::orientation::OrientationTracker;
use crate::platform::{
    ImmersiveKind, ImmersiveSession, PermissionState, Platform, ReferenceSpace, SessionEndListener,
    SessionFeature, SessionFeatures,
};
use crate::rendering::{Rect, RenderSurface};
use crate::scene_graph::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationMode {
    Normal,
    NativeImmersive(ImmersiveKind),
    FallbackStereo,
}

impl fmt::Display for PresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationMode::Normal => write!(f, "normal view"),
            PresentationMode::NativeImmersive(kind) => write!(f, "{kind} session"),
            PresentationMode::FallbackStereo => write!(f, "stereo view"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    Vr,
    Ar,
    FallbackStereo,
}

impl fmt::Display for ModeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeRequest::Vr => write!(f, "VR"),
            ModeRequest::Ar => write!(f, "AR"),
            ModeRequest::FallbackStereo => write!(f, "stereo view"),
        }
    }
}

/// How the frame driver should draw the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    Normal,
    Stereo,
    Immersive(ImmersiveKind),
}

/// Which modes this device can enter. Probed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub vr: bool,
    pub ar: bool,
    pub fallback_stereo: bool,
}

impl Capabilities {
    pub fn detect<P: Platform + ?Sized>(platform: &P) -> Self {
        let vr = platform.is_session_supported(ImmersiveKind::Vr);
        let ar = platform.is_session_supported(ImmersiveKind::Ar);

        Self {
            vr,
            ar,
            fallback_stereo: !vr && platform.is_handheld(),
        }
    }

    pub fn supports(&self, request: ModeRequest) -> bool {
        match request {
            ModeRequest::Vr => self.vr,
            ModeRequest::Ar => self.ar,
            ModeRequest::FallbackStereo => self.fallback_stereo,
        }
    }
}

/// Viewer state a mode transition may touch.
pub struct ViewContext<'a, S: RenderSurface + ?Sized> {
    pub scene: &'a mut Scene,
    pub camera: &'a mut Camera,
    pub tracker: &'a mut OrientationTracker,
    pub surface: &'a mut S,
}

/// Outcome of entering the stereo view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoEntry {
    /// `false` when orientation access was denied; the view is then static.
    pub tracking: bool,
}

#[derive(Debug, Clone, Copy)]
struct SavedTransform {
    translation: Vec3,
    scale: Vec3,
}

struct ActiveSession {
    session: Box<dyn ImmersiveSession>,
    end_listener: SessionEndListener,
}

/// Owns the presentation mode and every temporary change a mode makes to
/// the viewer, so that all exit paths can undo them.
pub struct SessionController {
    capabilities: Capabilities,
    mode: PresentationMode,
    saved_transform: Option<SavedTransform>,
    saved_background: Option<Option<Vec3>>,
    active: Option<ActiveSession>,
    awaiting_fullscreen: bool,
    reference_space: ReferenceSpace,
    immersive: ImmersiveConfig,
    stereo_fov_degrees: f32,
}

impl SessionController {
    pub fn new(capabilities: Capabilities, immersive: ImmersiveConfig, stereo_fov_degrees: f32) -> Self {
        log::info!(
            "Presentation capabilities: VR {}, AR {}, stereo fallback {}",
            capabilities.vr,
            capabilities.ar,
            capabilities.fallback_stereo
        );

        Self {
            capabilities,
            mode: PresentationMode::Normal,
            saved_transform: None,
            saved_background: None,
            active: None,
            awaiting_fullscreen: false,
            reference_space: ReferenceSpace::LocalFloor,
            immersive,
            stereo_fov_degrees,
        }
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Reference space the next VR session renders in.
    pub fn reference_space(&self) -> ReferenceSpace {
        self.reference_space
    }

    pub fn render_path(&self) -> RenderPath {
        match self.mode {
            PresentationMode::Normal => RenderPath::Normal,
            PresentationMode::FallbackStereo => RenderPath::Stereo,
            PresentationMode::NativeImmersive(kind) => RenderPath::Immersive(kind),
        }
    }

    fn check_entry(&self, request: ModeRequest, scene: &Scene) -> Result<(), SessionError> {
        if self.mode != PresentationMode::Normal {
            return Err(SessionError::IllegalTransition {
                current: self.mode,
                requested: request,
            });
        }
        if scene.model().is_none() {
            return Err(SessionError::NoModel);
        }
        if !self.capabilities.supports(request) {
            return Err(SessionError::Unsupported(request));
        }
        Ok(())
    }

    /// Shrinks the model to arm's length and starts a VR session. Any failure
    /// puts the model back where it was.
    pub fn enter_vr<P, S>(&mut self, platform: &mut P, ctx: ViewContext<'_, S>) -> Result<(), SessionError>
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        self.check_entry(ModeRequest::Vr, ctx.scene)?;
        self.fit_model_for_vr(ctx.scene)?;

        let preferred = SessionFeatures::default().with_optional([
            SessionFeature::Space(ReferenceSpace::LocalFloor),
            SessionFeature::Space(ReferenceSpace::BoundedFloor),
        ]);
        let minimal = SessionFeatures::required([SessionFeature::Space(ReferenceSpace::Local)]);

        let result = platform
            .request_session(ImmersiveKind::Vr, &preferred)
            .or_else(|err| {
                log::warn!("VR request with floor tracking failed ({err}), retrying with local space");
                platform.request_session(ImmersiveKind::Vr, &minimal)
            });

        match result {
            Ok(session) => {
                self.reference_space = session.reference_space();
                self.begin(session, ImmersiveKind::Vr);
                Ok(())
            }
            Err(err) => {
                log::warn!("Could not start VR session: {err}");
                self.restore_model_transform(ctx.scene);
                Err(err)
            }
        }
    }

    fn fit_model_for_vr(&mut self, scene: &mut Scene) -> Result<(), SessionError> {
        let model = scene.model_mut().ok_or(SessionError::NoModel)?;
        let root = model.root();
        let transform = model.root_transform();
        let saved = SavedTransform {
            translation: transform.translation(),
            scale: transform.scale(),
        };

        let max_dimension = model.bounding_box().max_dimension();
        if max_dimension > 0.0 {
            let factor = self.immersive.comfort_size / max_dimension;
            model.set_object_scale(root, saved.scale * factor);
        }
        model.set_object_translation(root, Vec3::from_array(self.immersive.model_position));

        self.saved_transform = Some(saved);
        Ok(())
    }

    fn restore_model_transform(&mut self, scene: &mut Scene) {
        let Some(saved) = self.saved_transform.take() else {
            return;
        };
        if let Some(model) = scene.model_mut() {
            let root = model.root();
            model.set_object_scale(root, saved.scale);
            model.set_object_translation(root, saved.translation);
        }
    }

    /// Starts a passthrough AR session with a transparent background.
    pub fn enter_ar<P, S>(&mut self, platform: &mut P, ctx: ViewContext<'_, S>) -> Result<(), SessionError>
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        self.check_entry(ModeRequest::Ar, ctx.scene)?;

        let preferred = SessionFeatures::required([SessionFeature::Space(ReferenceSpace::Local)])
            .with_optional([SessionFeature::HitTest]);
        let minimal = SessionFeatures::required([SessionFeature::Space(ReferenceSpace::Viewer)]);

        let session = platform
            .request_session(ImmersiveKind::Ar, &preferred)
            .or_else(|err| {
                log::warn!("AR request with local space failed ({err}), retrying with viewer space");
                platform.request_session(ImmersiveKind::Ar, &minimal)
            })
            .inspect_err(|err| log::warn!("Could not start AR session: {err}"))?;

        self.reference_space = session.reference_space();
        self.saved_background = Some(ctx.scene.background.take());
        ctx.surface.set_clear_alpha(0.0);

        self.begin(session, ImmersiveKind::Ar);
        Ok(())
    }

    fn begin(&mut self, mut session: Box<dyn ImmersiveSession>, kind: ImmersiveKind) {
        let end_listener = SessionEndListener::new();
        session.set_end_listener(end_listener.clone());

        self.active = Some(ActiveSession {
            session,
            end_listener,
        });
        self.mode = PresentationMode::NativeImmersive(kind);
        log::info!("Entered {} ({:?} space)", self.mode, self.reference_space);
    }

    /// Goes fullscreen, then starts head tracking. Denied orientation access
    /// still enters the mode, without tracking.
    pub fn enter_fallback_stereo<P, S>(
        &mut self,
        platform: &mut P,
        ctx: ViewContext<'_, S>,
    ) -> Result<StereoEntry, SessionError>
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        self.check_entry(ModeRequest::FallbackStereo, ctx.scene)?;
        self.mode = PresentationMode::FallbackStereo;

        self.awaiting_fullscreen = platform.request_fullscreen();
        if !self.awaiting_fullscreen {
            self.apply_landscape(platform, ctx.surface, ctx.camera);
        }

        ctx.surface.set_scissor_test(true);

        let tracking = !platform.requires_permission()
            || platform.request_permission() == PermissionState::Granted;
        if tracking {
            ctx.tracker.attach(platform);
        } else {
            log::warn!("Orientation access denied, stereo view stays static");
        }

        if let Err(err) = platform.lock_landscape() {
            log::debug!("Landscape lock skipped: {err}");
        }

        log::info!("Entered {}", self.mode);
        Ok(StereoEntry { tracking })
    }

    /// Fullscreen confirmation from the platform. Only the first confirmation
    /// after entering the stereo view resizes the target.
    pub fn on_fullscreen_changed<P, S>(&mut self, platform: &P, is_fullscreen: bool, surface: &mut S, camera: &mut Camera)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        if self.mode != PresentationMode::FallbackStereo || !self.awaiting_fullscreen || !is_fullscreen {
            return;
        }
        self.awaiting_fullscreen = false;
        self.apply_landscape(platform, surface, camera);
    }

    fn apply_landscape<P, S>(&self, platform: &P, surface: &mut S, camera: &mut Camera)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let (screen_width, screen_height) = platform.screen_size();
        let width = screen_width.max(screen_height);
        let height = screen_width.min(screen_height).max(1);

        surface.set_size(width, height);
        camera.aspect = (width as f32 / 2.0) / height as f32;
        camera.fov_y_degrees = self.stereo_fov_degrees;
    }

    /// Leaves whatever mode is active. Safe to call repeatedly and from any
    /// mode; in normal view it does nothing.
    pub fn exit_current_mode<P, S>(&mut self, platform: &mut P, ctx: ViewContext<'_, S>)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        match self.mode {
            PresentationMode::Normal => {}
            PresentationMode::NativeImmersive(kind) => {
                if let Some(active) = self.active.as_mut() {
                    active.session.end();
                }
                self.finish_immersive(kind, platform, ctx);
            }
            PresentationMode::FallbackStereo => self.exit_stereo(platform, ctx),
        }
    }

    /// Picks up sessions that ended on the device side.
    pub fn poll<P, S>(&mut self, platform: &mut P, ctx: ViewContext<'_, S>)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let PresentationMode::NativeImmersive(kind) = self.mode else {
            return;
        };

        let ended = self
            .active
            .as_ref()
            .is_none_or(|active| active.end_listener.has_fired());
        if ended {
            self.finish_immersive(kind, platform, ctx);
        }
    }

    fn finish_immersive<P, S>(&mut self, kind: ImmersiveKind, platform: &mut P, ctx: ViewContext<'_, S>)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        self.active = None;

        match kind {
            ImmersiveKind::Vr => {
                self.restore_model_transform(ctx.scene);
                let (width, height) = platform.container_size();
                fit_to_container(width, height, ctx.surface, ctx.camera);
            }
            ImmersiveKind::Ar => {
                if let Some(background) = self.saved_background.take() {
                    ctx.scene.background = background;
                }
                ctx.surface.set_clear_alpha(1.0);
                self.reference_space = ReferenceSpace::LocalFloor;
            }
        }

        log::info!("Left {}", self.mode);
        self.mode = PresentationMode::Normal;
    }

    fn exit_stereo<P, S>(&mut self, platform: &mut P, ctx: ViewContext<'_, S>)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        self.awaiting_fullscreen = false;
        platform.exit_fullscreen();
        ctx.tracker.detach(platform);
        ctx.surface.set_scissor_test(false);

        ctx.camera.fov_y_degrees = DEFAULT_FOV_DEGREES;
        let (width, height) = platform.container_size();
        fit_to_container(width, height, ctx.surface, ctx.camera);
        ctx.camera.rotation = Quat::IDENTITY;

        log::info!("Left {}", self.mode);
        self.mode = PresentationMode::Normal;
    }

    /// Layout-driven resize. Ignored while any immersive or stereo mode owns
    /// the render target; returns whether it was applied.
    pub fn handle_container_resize<S>(&self, width: u32, height: u32, surface: &mut S, camera: &mut Camera) -> bool
    where
        S: RenderSurface + ?Sized,
    {
        if self.mode != PresentationMode::Normal {
            return false;
        }
        fit_to_container(width, height, surface, camera);
        true
    }

    /// A new model invalidates any transform saved from the previous one.
    pub fn on_model_replaced(&mut self) {
        self.saved_transform = None;
    }
}

fn fit_to_container<S: RenderSurface + ?Sized>(width: u32, height: u32, surface: &mut S, camera: &mut Camera) {
    if width == 0 || height == 0 {
        return;
    }
    camera.aspect = width as f32 / height as f32;
    surface.set_size(width, height);
    surface.set_viewport(Rect::full(width, height));
    surface.set_scissor(Rect::full(width, height));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::platform::testing::FakePlatform;
    use crate::rendering::testing::RecordingSurface;
    use crate::scene_graph::scene_model::tests::unit_cube_mesh;
    use crate::scene_graph::{Object3D, SceneModel};

    struct Fixture {
        scene: Scene,
        camera: Camera,
        tracker: OrientationTracker,
        surface: RecordingSurface,
        platform: FakePlatform,
        controller: SessionController,
    }

    impl Fixture {
        fn new(platform: FakePlatform) -> Self {
            let config = ViewerConfig::default();
            let mut scene = Scene::new(Vec3::splat(0.04));

            let mut model = SceneModel::new("Cube");
            let mesh_id = model.add_mesh(unit_cube_mesh());
            let object = model.add_object(Object3D::named("Cube"), None);
            model.get_object_mut(object).unwrap().mesh_id = Some(mesh_id);
            model.set_object_transform(
                model.root(),
                Vec3::new(0.3, 1.7, -2.9),
                Quat::IDENTITY,
                Vec3::new(3.0, 1.5, 0.25),
            );
            scene.replace_model(model);

            let (width, height) = platform.container;
            Self {
                scene,
                camera: Camera::new(width as f32 / height as f32),
                tracker: OrientationTracker::new(None),
                surface: RecordingSurface::new(width, height),
                controller: SessionController::new(
                    Capabilities::detect(&platform),
                    config.immersive,
                    config.stereo.fov_degrees,
                ),
                platform,
            }
        }

        fn ctx(&mut self) -> (&mut SessionController, &mut FakePlatform, ViewContext<'_, RecordingSurface>) {
            (
                &mut self.controller,
                &mut self.platform,
                ViewContext {
                    scene: &mut self.scene,
                    camera: &mut self.camera,
                    tracker: &mut self.tracker,
                    surface: &mut self.surface,
                },
            )
        }

        fn root_translation_and_scale(&self) -> (Vec3, Vec3) {
            let transform = self.scene.model().unwrap().root_transform();
            (transform.translation(), transform.scale())
        }
    }

    #[test]
    fn vr_round_trip_restores_model_transform() {
        let mut fixture = Fixture::new(FakePlatform::desktop_with_xr());
        let before = fixture.root_translation_and_scale();

        let (controller, platform, ctx) = fixture.ctx();
        controller.enter_vr(platform, ctx).unwrap();
        assert_eq!(fixture.controller.mode(), PresentationMode::NativeImmersive(ImmersiveKind::Vr));

        let bounds = fixture.scene.model().unwrap().bounding_box();
        assert!((bounds.max_dimension() - 0.4).abs() < 1e-5);
        assert_eq!(fixture.root_translation_and_scale().0, Vec3::new(0.0, 1.2, -1.5));

        let (controller, platform, ctx) = fixture.ctx();
        controller.exit_current_mode(platform, ctx);
        assert_eq!(fixture.controller.mode(), PresentationMode::Normal);
        assert_eq!(fixture.root_translation_and_scale(), before);

        let (controller, platform, ctx) = fixture.ctx();
        controller.exit_current_mode(platform, ctx);
        assert_eq!(fixture.root_translation_and_scale(), before);
    }

    #[test]
    fn vr_retries_with_local_space() {
        let mut platform = FakePlatform::desktop_with_xr();
        platform.rejections = 1;
        let mut fixture = Fixture::new(platform);

        let (controller, platform, ctx) = fixture.ctx();
        controller.enter_vr(platform, ctx).unwrap();

        assert_eq!(fixture.platform.requests.len(), 2);
        assert_eq!(
            fixture.platform.requests[1].1.required,
            vec![SessionFeature::Space(ReferenceSpace::Local)]
        );
        assert_eq!(fixture.controller.reference_space(), ReferenceSpace::Local);
    }

    #[test]
    fn rejected_vr_rolls_back() {
        let mut platform = FakePlatform::desktop_with_xr();
        platform.rejections = 2;
        let mut fixture = Fixture::new(platform);
        let before = fixture.root_translation_and_scale();

        let (controller, platform, ctx) = fixture.ctx();
        let result = controller.enter_vr(platform, ctx);

        assert!(matches!(result, Err(SessionError::Rejected(_))));
        assert_eq!(fixture.controller.mode(), PresentationMode::Normal);
        assert_eq!(fixture.root_translation_and_scale(), before);
    }

    #[test]
    fn ar_end_notification_restores_background() {
        let mut fixture = Fixture::new(FakePlatform::desktop_with_xr());
        let background = fixture.scene.background;

        let (controller, platform, ctx) = fixture.ctx();
        controller.enter_ar(platform, ctx).unwrap();
        assert_eq!(fixture.scene.background, None);
        assert_eq!(fixture.surface.clear_alpha, 0.0);
        assert_eq!(fixture.controller.reference_space(), ReferenceSpace::Local);

        let (controller, platform, ctx) = fixture.ctx();
        controller.poll(platform, ctx);
        assert_eq!(fixture.controller.mode(), PresentationMode::NativeImmersive(ImmersiveKind::Ar));

        fixture.platform.end_session_externally();
        let (controller, platform, ctx) = fixture.ctx();
        controller.poll(platform, ctx);

        assert_eq!(fixture.controller.mode(), PresentationMode::Normal);
        assert_eq!(fixture.scene.background, background);
        assert_eq!(fixture.surface.clear_alpha, 1.0);
        assert_eq!(fixture.controller.reference_space(), ReferenceSpace::LocalFloor);

        let (controller, platform, ctx) = fixture.ctx();
        controller.exit_current_mode(platform, ctx);
        assert_eq!(fixture.scene.background, background);
    }

    #[test]
    fn entering_a_second_mode_is_rejected() {
        let mut fixture = Fixture::new(FakePlatform::desktop_with_xr());
        let (controller, platform, ctx) = fixture.ctx();
        controller.enter_vr(platform, ctx).unwrap();

        let (controller, platform, ctx) = fixture.ctx();
        let result = controller.enter_ar(platform, ctx);

        assert_eq!(
            result,
            Err(SessionError::IllegalTransition {
                current: PresentationMode::NativeImmersive(ImmersiveKind::Vr),
                requested: ModeRequest::Ar,
            })
        );
        assert_eq!(fixture.platform.requests.len(), 1);
        assert!(fixture.scene.background.is_some());
    }

    #[test]
    fn entry_requires_model_and_support() {
        let mut fixture = Fixture::new(FakePlatform::desktop_with_xr());
        let (controller, platform, ctx) = fixture.ctx();
        assert_eq!(
            controller.enter_fallback_stereo(platform, ctx),
            Err(SessionError::Unsupported(ModeRequest::FallbackStereo))
        );

        fixture.scene.take_model();
        let (controller, platform, ctx) = fixture.ctx();
        assert_eq!(controller.enter_vr(platform, ctx), Err(SessionError::NoModel));
        assert!(fixture.platform.requests.is_empty());
    }

    #[test]
    fn stereo_round_trip() {
        let mut fixture = Fixture::new(FakePlatform::handheld());

        let (controller, platform, ctx) = fixture.ctx();
        let entry = controller.enter_fallback_stereo(platform, ctx).unwrap();
        assert!(entry.tracking);
        assert!(fixture.tracker.is_attached());
        assert!(fixture.surface.scissor_test);
        assert_eq!(fixture.surface.width, 390);

        fixture.controller.on_fullscreen_changed(
            &fixture.platform,
            true,
            &mut fixture.surface,
            &mut fixture.camera,
        );
        assert_eq!((fixture.surface.width, fixture.surface.height), (844, 390));
        assert_eq!(fixture.camera.fov_y_degrees, 80.0);
        assert!((fixture.camera.aspect - 422.0 / 390.0).abs() < 1e-6);

        assert!(!fixture.controller.handle_container_resize(
            100,
            100,
            &mut fixture.surface,
            &mut fixture.camera
        ));

        fixture.camera.rotation = Quat::from_rotation_y(1.0);
        let (controller, platform, ctx) = fixture.ctx();
        controller.exit_current_mode(platform, ctx);

        assert_eq!(fixture.controller.mode(), PresentationMode::Normal);
        assert_eq!(fixture.camera.fov_y_degrees, DEFAULT_FOV_DEGREES);
        assert!(!fixture.surface.scissor_test);
        assert_eq!(fixture.surface.viewport, Rect::full(390, 600));
        assert_eq!(fixture.camera.rotation, Quat::IDENTITY);
        assert_eq!(fixture.platform.orientation_listeners, 0);
        assert!(!fixture.platform.fullscreen);
    }

    #[test]
    fn denied_orientation_keeps_static_stereo() {
        let mut platform = FakePlatform::handheld();
        platform.requires_permission = true;
        platform.permission = PermissionState::Denied;
        let mut fixture = Fixture::new(platform);

        let (controller, platform, ctx) = fixture.ctx();
        let entry = controller.enter_fallback_stereo(platform, ctx).unwrap();

        assert!(!entry.tracking);
        assert!(!fixture.tracker.is_attached());
        assert_eq!(fixture.controller.mode(), PresentationMode::FallbackStereo);

        let (controller, platform, ctx) = fixture.ctx();
        controller.exit_current_mode(platform, ctx);
        assert_eq!(fixture.platform.orientation_listeners, 0);
        assert_eq!(fixture.camera.fov_y_degrees, DEFAULT_FOV_DEGREES);
    }
}
