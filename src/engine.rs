use crate::platform::Platform;
use crate::rendering::RenderSurface;
use crate::session::{PresentationMode, RenderPath};
use crate::viewer::Viewer;

/// One tick of the viewer: advance state by `delta` seconds, then draw.
pub fn update<P, S>(viewer: &mut Viewer, platform: &mut P, surface: &mut S, delta: f32)
where
    P: Platform + ?Sized,
    S: RenderSurface + ?Sized,
{
    viewer.poll_load();
    viewer.poll_session(platform, surface);

    if let Some(model) = viewer.scene.model_mut() {
        viewer.player.update(delta, model);
    }
    viewer.auto_rotate(delta);

    viewer.tracker.pump(platform, &mut viewer.camera);

    // The orientation sensor owns the camera rotation in the stereo view.
    if viewer.mode() != PresentationMode::FallbackStereo {
        viewer.controls.update(&mut viewer.camera);
    }

    render(viewer, surface);
    viewer.record_frame_time(delta);
}

pub fn render<S: RenderSurface + ?Sized>(viewer: &mut Viewer, surface: &mut S) {
    match viewer.session.render_path() {
        RenderPath::Stereo => viewer
            .stereo
            .render(surface, &viewer.scene, &mut viewer.camera),
        // The headset draws immersive sessions itself; the window keeps
        // showing the regular view.
        RenderPath::Normal | RenderPath::Immersive(_) => surface.render(&viewer.scene, &viewer.camera),
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::platform::testing::FakePlatform;
    use crate::platform::OrientationSample;
    use crate::rendering::testing::RecordingSurface;
    use crate::rendering::Rect;
    use crate::viewer::tests::{bouncing_triangle, runtime, viewer_for};

    #[test]
    fn normal_view_renders_once_per_tick() {
        let runtime = runtime();
        let mut platform = FakePlatform::desktop_with_xr();
        let mut viewer = viewer_for(&platform, &runtime);
        let mut surface = RecordingSurface::new(1280, 720);

        update(&mut viewer, &mut platform, &mut surface, 1.0 / 60.0);

        assert_eq!(surface.renders.len(), 1);
        assert_eq!(surface.renders[0].viewport, Rect::full(1280, 720));
        assert_eq!(viewer.fps(), 60);
    }

    #[test]
    fn stereo_view_renders_both_eyes_with_sensor_rotation() {
        let runtime = runtime();
        let mut platform = FakePlatform::handheld();
        let mut viewer = viewer_for(&platform, &runtime);
        let mut surface = RecordingSurface::new(390, 600);

        viewer.enter_fallback_stereo(&mut platform, &mut surface).unwrap();
        viewer.on_fullscreen_changed(&platform, true, &mut surface);

        platform.pending_samples.push(OrientationSample {
            alpha: 30.0,
            beta: 0.0,
            gamma: 0.0,
        });
        update(&mut viewer, &mut platform, &mut surface, 1.0 / 60.0);

        assert_eq!(surface.renders.len(), 2);
        assert_eq!(surface.renders[0].viewport, Rect::new(0, 0, 422, 390));
        assert_eq!(surface.renders[1].viewport, Rect::new(422, 0, 422, 390));

        let expected = Quat::from_rotation_y(30f32.to_radians());
        assert!(viewer.camera.rotation.angle_between(expected) < 1e-4);
    }

    #[test]
    fn auto_rotation_turns_the_model() {
        let runtime = runtime();
        let mut platform = FakePlatform::desktop_with_xr();
        let mut viewer = viewer_for(&platform, &runtime);
        let mut surface = RecordingSurface::new(1280, 720);

        viewer.set_auto_rotate_speed(0.5);
        for _ in 0..4 {
            update(&mut viewer, &mut platform, &mut surface, 0.5);
        }

        let rotation = viewer.scene.model().unwrap().root_transform().rotation();
        assert!(rotation.angle_between(Quat::from_rotation_y(1.0)) < 1e-4);
    }

    #[test]
    fn animation_advances_with_the_clock() {
        let runtime = runtime();
        let mut platform = FakePlatform::desktop_with_xr();
        let mut viewer = viewer_for(&platform, &runtime);
        let mut surface = RecordingSurface::new(1280, 720);
        viewer.finish_load(Ok(bouncing_triangle()));

        update(&mut viewer, &mut platform, &mut surface, 0.25);
        update(&mut viewer, &mut platform, &mut surface, 0.5);

        assert!((viewer.player.current_time() - 0.75).abs() < 1e-5);
    }

    #[test]
    fn ended_immersive_session_is_picked_up_on_the_next_tick() {
        let runtime = runtime();
        let mut platform = FakePlatform::desktop_with_xr();
        let mut viewer = viewer_for(&platform, &runtime);
        let mut surface = RecordingSurface::new(1280, 720);

        let before = viewer.scene.model().unwrap().root_transform().translation();
        viewer.enter_vr(&mut platform, &mut surface).unwrap();
        assert_eq!(
            viewer.scene.model().unwrap().root_transform().translation(),
            Vec3::new(0.0, 1.2, -1.5)
        );

        platform.end_session_externally();
        update(&mut viewer, &mut platform, &mut surface, 1.0 / 60.0);

        assert_eq!(viewer.mode(), PresentationMode::Normal);
        assert_eq!(viewer.scene.model().unwrap().root_transform().translation(), before);
    }
}
