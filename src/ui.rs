//! imgui control panel. Drawing only collects [`UiAction`]s; they are applied
//! once the frame's UI is built, when the platform and the render target are
//! available again.

use std::path::PathBuf;

use crate::animation::{AnimationPlayer, LoopMode, PlaybackIcon};
use crate::assets::AssetSource;
use crate::platform::Platform;
use crate::rendering::RenderSurface;
use crate::session::{ModeRequest, PresentationMode};
use crate::viewer::{NoticeLevel, Viewer};

const SPEED_RANGE: (f32, f32) = (0.1, 3.0);
const AUTO_ROTATE_RANGE: (f32, f32) = (0.0, 2.0);
const LIGHT_RANGE: (f32, f32) = (0.0, 3.0);

#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    LoadModel(PathBuf),
    SelectClip(usize),
    TogglePause,
    Stop,
    Scrub(f32),
    SetSpeed(f32),
    SetLoopMode(LoopMode),
    ResetCamera,
    EnterMode(ModeRequest),
    ExitMode,
    SetAmbient(f32),
    SetKeyLight(f32),
    SetBackground(u32),
    SetGrid(bool),
    SetWireframe(bool),
    SetAutoRotate(f32),
    DismissNotice,
}

impl UiAction {
    pub fn apply<P, S>(self, viewer: &mut Viewer, platform: &mut P, surface: &mut S)
    where
        P: Platform + ?Sized,
        S: RenderSurface + ?Sized,
    {
        match self {
            UiAction::LoadModel(path) => viewer.load_model(AssetSource::Path(path)),
            UiAction::SelectClip(index) => {
                viewer.select_clip(index);
            }
            UiAction::TogglePause => {
                viewer.toggle_pause();
            }
            UiAction::Stop => {
                viewer.stop();
            }
            UiAction::Scrub(time) => {
                viewer.scrub(time);
            }
            UiAction::SetSpeed(speed) => viewer.set_speed(speed),
            UiAction::SetLoopMode(loop_mode) => viewer.set_loop_mode(loop_mode),
            UiAction::ResetCamera => viewer.reset_camera(),
            UiAction::EnterMode(request) => {
                let result = match request {
                    ModeRequest::Vr => viewer.enter_vr(platform, surface),
                    ModeRequest::Ar => viewer.enter_ar(platform, surface),
                    ModeRequest::FallbackStereo => viewer.enter_fallback_stereo(platform, surface),
                };
                if let Err(err) = result {
                    log::debug!("Staying in {}: {err}", viewer.mode());
                }
            }
            UiAction::ExitMode => viewer.exit_current_mode(platform, surface),
            UiAction::SetAmbient(intensity) => viewer.set_ambient_intensity(intensity),
            UiAction::SetKeyLight(intensity) => viewer.set_key_light_intensity(intensity),
            UiAction::SetBackground(rgb) => viewer.set_background(rgb),
            UiAction::SetGrid(visible) => viewer.set_grid_visible(visible),
            UiAction::SetWireframe(wireframe) => viewer.set_wireframe(wireframe),
            UiAction::SetAutoRotate(speed) => viewer.set_auto_rotate_speed(speed),
            UiAction::DismissNotice => viewer.dismiss_notice(),
        }
    }
}

pub fn rgb_to_floats(rgb: u32) -> [f32; 3] {
    [
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    ]
}

pub fn floats_to_rgb(color: [f32; 3]) -> u32 {
    color
        .iter()
        .fold(0, |rgb, channel| (rgb << 8) | (channel.clamp(0.0, 1.0) * 255.0).round() as u32)
}

fn loading_bar(name: &str, percent: u8) -> (f32, String) {
    (f32::from(percent.min(100)) / 100.0, format!("{name} {percent}%"))
}

fn clip_labels(player: &AnimationPlayer) -> Vec<String> {
    player
        .clips()
        .iter()
        .enumerate()
        .map(|(index, clip)| clip.display_name(index))
        .collect()
}

/// Widget state that outlives a single frame.
#[derive(Debug, Default)]
pub struct ControlPanel {
    path_input: String,
}

impl ControlPanel {
    pub fn draw(&mut self, ui: &imgui::Ui, viewer: &mut Viewer, wireframe_supported: bool) -> Vec<UiAction> {
        let mut actions = Vec::new();

        ui.window("Viewer")
            .position([10.0, 10.0], imgui::Condition::FirstUseEver)
            .size([320.0, 560.0], imgui::Condition::FirstUseEver)
            .build(|| {
                self.model_section(ui, viewer, &mut actions);
                animation_section(ui, viewer, &mut actions);
                view_section(ui, viewer, &mut actions);
                display_section(ui, viewer, wireframe_supported, &mut actions);
            });

        actions
    }

    fn model_section(&mut self, ui: &imgui::Ui, viewer: &mut Viewer, actions: &mut Vec<UiAction>) {
        ui.text(format!("FPS: {}", viewer.fps()));

        let info = viewer.info();
        ui.text(format!("Model: {}", info.name));
        ui.text(format!("Vertices: {}", info.vertices));
        ui.text(format!("Faces: {}", info.faces));
        ui.text(format!("Animations: {}", info.animations));

        ui.input_text("##path", &mut self.path_input)
            .hint("path/to/model.glb")
            .build();
        ui.same_line();
        if ui.button("Load") && !self.path_input.trim().is_empty() {
            actions.push(UiAction::LoadModel(PathBuf::from(self.path_input.trim())));
        }

        if let Some((name, percent)) = viewer.loading_progress() {
            let (fraction, overlay) = loading_bar(&name, percent);
            imgui::ProgressBar::new(fraction).overlay_text(overlay).build(ui);
        }

        if let Some(notice) = viewer.notice() {
            let color = match notice.level {
                NoticeLevel::Info => [0.6, 0.85, 1.0, 1.0],
                NoticeLevel::Error => [1.0, 0.4, 0.4, 1.0],
            };
            ui.text_colored(color, &notice.message);
            ui.same_line();
            if ui.small_button("x") {
                actions.push(UiAction::DismissNotice);
            }
        }
    }
}

fn animation_section(ui: &imgui::Ui, viewer: &Viewer, actions: &mut Vec<UiAction>) {
    let player = &viewer.player;
    if !player.has_clips() {
        return;
    }
    if !ui.collapsing_header("Animation", imgui::TreeNodeFlags::DEFAULT_OPEN) {
        return;
    }

    let names = clip_labels(player);
    let mut selected = player.selected_index().unwrap_or(0);
    if ui.combo_simple_string("Clip", &mut selected, &names) {
        actions.push(UiAction::SelectClip(selected));
    }

    let display = player.display();
    let label = match display.icon {
        PlaybackIcon::Play => "Play",
        PlaybackIcon::Pause => "Pause",
    };
    if ui.button(label) {
        // With nothing bound, play restarts the selected clip.
        if player.selected_index().is_some() {
            actions.push(UiAction::TogglePause);
        } else {
            actions.push(UiAction::SelectClip(selected));
        }
    }
    ui.same_line();
    if ui.button("Stop") {
        actions.push(UiAction::Stop);
    }
    ui.same_line();
    ui.text(display.time_label());

    let mut time = display.current_time;
    if ui.slider("Time", 0.0, display.scrub_max.max(f32::EPSILON), &mut time) {
        actions.push(UiAction::Scrub(time));
    }

    let mut speed = player.speed();
    if ui.slider("Speed", SPEED_RANGE.0, SPEED_RANGE.1, &mut speed) {
        actions.push(UiAction::SetSpeed(speed));
    }

    let mut looping = player.loop_mode() == LoopMode::Repeat;
    if ui.checkbox("Loop", &mut looping) {
        let loop_mode = if looping { LoopMode::Repeat } else { LoopMode::Once };
        actions.push(UiAction::SetLoopMode(loop_mode));
    }
}

fn view_section(ui: &imgui::Ui, viewer: &Viewer, actions: &mut Vec<UiAction>) {
    if !ui.collapsing_header("View", imgui::TreeNodeFlags::DEFAULT_OPEN) {
        return;
    }

    let position = viewer.camera.position;
    let target = viewer.orbit_target();
    ui.text(format!("Camera: ({:.2}, {:.2}, {:.2})", position.x, position.y, position.z));
    ui.text(format!("Target: ({:.2}, {:.2}, {:.2})", target.x, target.y, target.z));
    if ui.button("Reset camera") {
        actions.push(UiAction::ResetCamera);
    }

    let mode = viewer.mode();
    if mode != PresentationMode::Normal {
        ui.text(format!("Mode: {mode}"));
        if mode == PresentationMode::FallbackStereo {
            let tracking = if viewer.tracker.is_attached() { "on" } else { "off" };
            ui.text(format!("Head tracking: {tracking}"));
        }
        if ui.button("Exit") {
            actions.push(UiAction::ExitMode);
        }
        return;
    }

    let capabilities = viewer.session.capabilities();
    let mut first = true;
    for (request, label) in [
        (ModeRequest::Vr, "Enter VR"),
        (ModeRequest::Ar, "Enter AR"),
        (ModeRequest::FallbackStereo, "Stereo view"),
    ] {
        if !capabilities.supports(request) {
            continue;
        }
        if !first {
            ui.same_line();
        }
        first = false;
        if ui.button(label) {
            actions.push(UiAction::EnterMode(request));
        }
    }
    if first {
        ui.text_disabled("No VR or AR support on this device");
    }
}

fn display_section(ui: &imgui::Ui, viewer: &Viewer, wireframe_supported: bool, actions: &mut Vec<UiAction>) {
    if !ui.collapsing_header("Display", imgui::TreeNodeFlags::DEFAULT_OPEN) {
        return;
    }

    let mut ambient = viewer.ambient_intensity();
    if ui.slider("Ambient", LIGHT_RANGE.0, LIGHT_RANGE.1, &mut ambient) {
        actions.push(UiAction::SetAmbient(ambient));
    }

    let mut key = viewer.key_light_intensity();
    if ui.slider("Key light", LIGHT_RANGE.0, LIGHT_RANGE.1, &mut key) {
        actions.push(UiAction::SetKeyLight(key));
    }

    let mut background = rgb_to_floats(viewer.background());
    if ui.color_edit3("Background", &mut background) {
        actions.push(UiAction::SetBackground(floats_to_rgb(background)));
    }

    let mut grid = viewer.scene.grid_visible;
    if ui.checkbox("Grid", &mut grid) {
        actions.push(UiAction::SetGrid(grid));
    }

    if wireframe_supported {
        let mut wireframe = viewer.scene.wireframe;
        if ui.checkbox("Wireframe", &mut wireframe) {
            actions.push(UiAction::SetWireframe(wireframe));
        }
    }

    let mut auto_rotate = viewer.auto_rotate_speed();
    if ui.slider("Auto rotate", AUTO_ROTATE_RANGE.0, AUTO_ROTATE_RANGE.1, &mut auto_rotate) {
        actions.push(UiAction::SetAutoRotate(auto_rotate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::FakePlatform;
    use crate::rendering::testing::RecordingSurface;
    use crate::viewer::tests::{bouncing_triangle, runtime, viewer_for};

    #[test]
    fn colors_convert_both_ways() {
        assert_eq!(rgb_to_floats(0xff0080), [1.0, 0.0, 128.0 / 255.0]);
        assert_eq!(floats_to_rgb(rgb_to_floats(0x0a0a0a)), 0x0a0a0a);
        assert_eq!(floats_to_rgb([2.0, -1.0, 0.5]), 0xff0080);
    }

    #[test]
    fn loading_bar_shows_name_and_percent() {
        assert_eq!(loading_bar("Fox.glb", 40), (0.4, "Fox.glb 40%".to_string()));
        assert_eq!(loading_bar("Fox.glb", 100).0, 1.0);
    }

    #[test]
    fn unnamed_clips_are_numbered_in_the_selector() {
        use crate::animation::AnimationClip;

        let runtime = runtime();
        let mut viewer = viewer_for(&FakePlatform::desktop_with_xr(), &runtime);
        let mut asset = bouncing_triangle();
        asset.clips.push(AnimationClip::new("", Vec::new()));
        viewer.finish_load(Ok(asset));

        assert_eq!(clip_labels(&viewer.player), ["Bounce", "Animation 2"]);
    }

    #[test]
    fn actions_reach_the_viewer() {
        let runtime = runtime();
        let mut platform = FakePlatform::desktop_with_xr();
        let mut viewer = viewer_for(&platform, &runtime);
        let mut surface = RecordingSurface::new(1280, 720);
        viewer.finish_load(Ok(bouncing_triangle()));

        for action in [
            UiAction::TogglePause,
            UiAction::SetSpeed(2.0),
            UiAction::SetLoopMode(LoopMode::Once),
            UiAction::SetGrid(false),
            UiAction::SetAutoRotate(0.5),
            UiAction::SetBackground(0x123456),
            UiAction::DismissNotice,
        ] {
            action.apply(&mut viewer, &mut platform, &mut surface);
        }

        assert_eq!(viewer.player.state(), crate::animation::player::PlaybackState::Paused);
        assert_eq!(viewer.player.speed(), 2.0);
        assert_eq!(viewer.player.loop_mode(), LoopMode::Once);
        assert!(!viewer.scene.grid_visible);
        assert_eq!(viewer.auto_rotate_speed(), 0.5);
        assert_eq!(viewer.background(), 0x123456);
        assert!(viewer.notice().is_none());
    }

    #[test]
    fn mode_buttons_enter_and_exit() {
        let runtime = runtime();
        let mut platform = FakePlatform::desktop_with_xr();
        let mut viewer = viewer_for(&platform, &runtime);
        let mut surface = RecordingSurface::new(1280, 720);

        UiAction::EnterMode(ModeRequest::Ar).apply(&mut viewer, &mut platform, &mut surface);
        assert_eq!(viewer.mode(), PresentationMode::NativeImmersive(crate::platform::ImmersiveKind::Ar));

        UiAction::ExitMode.apply(&mut viewer, &mut platform, &mut surface);
        assert_eq!(viewer.mode(), PresentationMode::Normal);

        UiAction::EnterMode(ModeRequest::FallbackStereo).apply(&mut viewer, &mut platform, &mut surface);
        assert_eq!(viewer.mode(), PresentationMode::Normal);
        assert_eq!(viewer.notice().map(|notice| notice.level), Some(NoticeLevel::Error));
    }
}
