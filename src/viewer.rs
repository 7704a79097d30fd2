use glam::{Quat, Vec3};

use crate::animation::{AnimationPlayer, LoopMode};
use crate::assets::placeholder::demo_model;
use crate::assets::{AssetSource, LoadTask, LoadedAsset};
use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::controls::OrbitControls;
use crate::error::{LoadError, SessionError};
use crate::framing::{frame_for_load, frame_for_reset, frame_from_direction, normalize_model, Framing};
use crate::model::color_from_hex;
use crate::orientation::OrientationTracker;
use crate::platform::Platform;
use crate::rendering::RenderSurface;
use crate::scene_graph::Scene;
use crate::session::{Capabilities, PresentationMode, SessionController, ViewContext};
use crate::stereo::StereoRenderer;

/// What the info panel shows about the current model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelInfo {
    pub name: String,
    pub vertices: usize,
    pub faces: usize,
    pub animations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Last user facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// All viewer state the frame loop and the control panel work on.
pub struct Viewer {
    pub config: ViewerConfig,
    pub scene: Scene,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub player: AnimationPlayer,
    pub tracker: OrientationTracker,
    pub session: SessionController,
    pub stereo: StereoRenderer,

    runtime: tokio::runtime::Handle,
    loading: Option<LoadTask>,
    info: ModelInfo,
    notice: Option<Notice>,
    background: u32,
    auto_rotate_speed: f32,
    fps: u32,
}

impl Viewer {
    /// Starts out showing the demo model.
    pub fn new(
        config: ViewerConfig,
        capabilities: Capabilities,
        runtime: tokio::runtime::Handle,
        container: (u32, u32),
    ) -> Self {
        let aspect = container.0.max(1) as f32 / container.1.max(1) as f32;
        let loop_mode = if config.playback.looping {
            LoopMode::Repeat
        } else {
            LoopMode::Once
        };

        let mut viewer = Self {
            scene: Scene::new(color_from_hex(config.background)),
            camera: Camera::new(aspect),
            controls: OrbitControls::new(config.controls.clone()),
            player: AnimationPlayer::new(config.playback.speed, loop_mode),
            tracker: OrientationTracker::new(config.stereo.orientation_smoothing),
            session: SessionController::new(capabilities, config.immersive.clone(), config.stereo.fov_degrees),
            stereo: StereoRenderer::new(config.stereo.eye_separation),
            background: config.background,
            config,
            runtime,
            loading: None,
            info: ModelInfo::default(),
            notice: None,
            auto_rotate_speed: 0.0,
            fps: 0,
        };
        viewer.install(demo_model(), false);
        viewer
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn mode(&self) -> PresentationMode {
        self.session.mode()
    }

    /// Name and percentage of the load in flight.
    pub fn loading_progress(&mut self) -> Option<(String, u8)> {
        self.loading
            .as_mut()
            .map(|task| (task.name().to_string(), task.progress()))
    }

    /// Starts loading `source` in the background. A load still in flight is
    /// abandoned; the current animations stop right away and the outgoing
    /// model returns to its rest pose.
    pub fn load_model(&mut self, source: AssetSource) {
        if let Some(previous) = self.loading.take() {
            log::info!("Abandoning load of {}", previous.name());
            previous.cancel();
        }

        self.player.stop();
        if let Some(model) = self.scene.model_mut() {
            self.player.update(0.0, model);
        }
        self.player.clear();

        let task = LoadTask::spawn(&self.runtime, source);
        self.notice = Some(Notice::info(format!("Loading {}", task.name())));
        self.loading = Some(task);
    }

    /// Installs the finished load, if any.
    pub fn poll_load(&mut self) {
        let Some(result) = self.loading.as_mut().and_then(LoadTask::poll) else {
            return;
        };
        self.loading = None;
        self.finish_load(result);
    }

    pub fn finish_load(&mut self, result: Result<LoadedAsset, LoadError>) {
        match result {
            Ok(asset) => {
                let name = asset.name.clone();
                self.install(asset, true);
                self.notice = Some(Notice::info(format!("Loaded {name}")));
            }
            Err(err) => {
                log::error!("Showing demo model after failed load: {err}");
                self.install(demo_model(), false);
                self.notice = Some(Notice::error(format!("Error loading model: {err}")));
            }
        }
    }

    fn install(&mut self, asset: LoadedAsset, normalize: bool) {
        let LoadedAsset { name, mut model, clips } = asset;

        let bounds = if normalize {
            normalize_model(&mut model, self.config.normalize.target_size)
        } else {
            model.bounding_box()
        };

        self.player.clear();
        self.player.set_clips(clips, &model);
        if self.player.has_clips() {
            self.player.select(0);
        }

        let stats = model.stats();
        self.info = ModelInfo {
            name,
            vertices: stats.vertices,
            faces: stats.faces,
            animations: self.player.clips().len(),
        };

        self.scene.replace_model(model);
        self.session.on_model_replaced();

        if normalize {
            if let Some(framing) = frame_for_load(&bounds, self.camera.fov_y_radians(), &self.config.framing) {
                self.apply_framing(framing);
            }
        }

        log::info!(
            "Showing {} ({} vertices, {} faces, {} animations)",
            self.info.name,
            self.info.vertices,
            self.info.faces,
            self.info.animations
        );
    }

    fn apply_framing(&mut self, framing: Framing) {
        framing.apply(&mut self.camera);
        self.controls.set_target(framing.target);
    }

    pub fn reset_camera(&mut self) {
        let bounds = self.scene.model().map(|model| model.bounding_box());
        let framing = frame_for_reset(bounds.as_ref(), self.camera.fov_y_radians(), &self.config.framing);
        self.apply_framing(framing);
    }

    pub fn select_clip(&mut self, index: usize) -> bool {
        self.player.select(index)
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.player.toggle_pause()
    }

    pub fn stop(&mut self) -> bool {
        self.player.stop()
    }

    pub fn scrub(&mut self, time: f32) -> bool {
        self.player.scrub(time)
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.player.set_speed(speed);
    }

    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.player.set_loop_mode(loop_mode);
    }

    fn report(&mut self, result: Result<(), SessionError>) -> Result<(), SessionError> {
        if let Err(err) = &result {
            self.notice = Some(Notice::error(err.to_string()));
        }
        result
    }

    pub fn enter_vr<P, S>(&mut self, platform: &mut P, surface: &mut S) -> Result<(), SessionError>
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let ctx = ViewContext {
            scene: &mut self.scene,
            camera: &mut self.camera,
            tracker: &mut self.tracker,
            surface,
        };
        let result = self.session.enter_vr(platform, ctx);
        self.report(result)
    }

    pub fn enter_ar<P, S>(&mut self, platform: &mut P, surface: &mut S) -> Result<(), SessionError>
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let ctx = ViewContext {
            scene: &mut self.scene,
            camera: &mut self.camera,
            tracker: &mut self.tracker,
            surface,
        };
        let result = self.session.enter_ar(platform, ctx);
        self.report(result)
    }

    /// Enters the stereo view and pulls the camera back along its current
    /// bearing so the whole model fits both eyes.
    pub fn enter_fallback_stereo<P, S>(&mut self, platform: &mut P, surface: &mut S) -> Result<(), SessionError>
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let ctx = ViewContext {
            scene: &mut self.scene,
            camera: &mut self.camera,
            tracker: &mut self.tracker,
            surface,
        };
        let entry = match self.session.enter_fallback_stereo(platform, ctx) {
            Ok(entry) => entry,
            Err(err) => return self.report(Err(err)),
        };

        let bounds = self.scene.model().map(|model| model.bounding_box());
        if let Some(framing) = bounds
            .as_ref()
            .and_then(|bounds| frame_from_direction(bounds, self.camera.position, &self.config.framing))
        {
            self.apply_framing(framing);
        }

        if !entry.tracking {
            self.notice = Some(Notice::info("Motion access denied, the stereo view will not follow head movement"));
        }
        Ok(())
    }

    pub fn exit_current_mode<P, S>(&mut self, platform: &mut P, surface: &mut S)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let ctx = ViewContext {
            scene: &mut self.scene,
            camera: &mut self.camera,
            tracker: &mut self.tracker,
            surface,
        };
        self.session.exit_current_mode(platform, ctx);
        self.sync_background();
    }

    /// Picks up immersive sessions that ended on the device side.
    pub fn poll_session<P, S>(&mut self, platform: &mut P, surface: &mut S)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let ctx = ViewContext {
            scene: &mut self.scene,
            camera: &mut self.camera,
            tracker: &mut self.tracker,
            surface,
        };
        self.session.poll(platform, ctx);
        self.sync_background();
    }

    pub fn on_fullscreen_changed<P, S>(&mut self, platform: &P, is_fullscreen: bool, surface: &mut S)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        self.session
            .on_fullscreen_changed(platform, is_fullscreen, surface, &mut self.camera);
    }

    /// Window resize. Ignored while a presentation mode owns the target.
    pub fn handle_resize<S: RenderSurface + ?Sized>(&mut self, width: u32, height: u32, surface: &mut S) -> bool {
        self.session
            .handle_container_resize(width, height, surface, &mut self.camera)
    }

    pub fn ambient_intensity(&self) -> f32 {
        self.scene.lighting.ambient_intensity
    }

    pub fn set_ambient_intensity(&mut self, intensity: f32) {
        self.scene.lighting.ambient_intensity = intensity.max(0.0);
    }

    pub fn key_light_intensity(&self) -> f32 {
        self.scene.lighting.key.intensity
    }

    pub fn set_key_light_intensity(&mut self, intensity: f32) {
        self.scene.lighting.key.intensity = intensity.max(0.0);
    }

    pub fn background(&self) -> u32 {
        self.background
    }

    /// Takes effect immediately unless an AR session hides the background;
    /// then it applies once the session ends.
    pub fn set_background(&mut self, rgb: u32) {
        self.background = rgb & 0xffffff;
        self.sync_background();
    }

    fn sync_background(&mut self) {
        if self.scene.background.is_some() {
            self.scene.background = Some(color_from_hex(self.background));
        }
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.scene.grid_visible = visible;
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.scene.wireframe = wireframe;
    }

    pub fn auto_rotate_speed(&self) -> f32 {
        self.auto_rotate_speed
    }

    /// Model yaw rate in radians per second. Zero disables auto rotation.
    pub fn set_auto_rotate_speed(&mut self, speed: f32) {
        self.auto_rotate_speed = speed;
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub(crate) fn record_frame_time(&mut self, delta: f32) {
        if delta > 0.0 {
            self.fps = (1.0 / delta).round() as u32;
        }
    }

    pub(crate) fn auto_rotate(&mut self, delta: f32) {
        if self.auto_rotate_speed == 0.0 {
            return;
        }
        let Some(model) = self.scene.model_mut() else {
            return;
        };

        let root = model.root();
        let rotation = Quat::from_rotation_y(self.auto_rotate_speed * delta) * model.root_transform().rotation();
        model.set_object_rotation(root, rotation);
    }

    /// World position the orbit controls circle around.
    pub fn orbit_target(&self) -> Vec3 {
        self.controls.target
    }
}
