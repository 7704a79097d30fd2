use crate::camera::Camera;
use crate::rendering::{Rect, RenderSurface};
use crate::scene_graph::Scene;

/// Side-by-side stereo for headsets that hold a phone in front of the eyes.
pub struct StereoRenderer {
    pub eye_separation: f32,
}

impl StereoRenderer {
    pub fn new(eye_separation: f32) -> Self {
        Self { eye_separation }
    }

    /// Left and right eye rectangles of a `width` x `height` target. An odd
    /// trailing column is left unused.
    pub fn eye_viewports(width: u32, height: u32) -> [Rect; 2] {
        let half_width = width / 2;
        [
            Rect::new(0, 0, half_width, height),
            Rect::new(half_width, 0, half_width, height),
        ]
    }

    /// Renders the scene once per eye. The camera position is left exactly as
    /// it was; its aspect ends up matching one eye.
    pub fn render<S: RenderSurface + ?Sized>(&self, surface: &mut S, scene: &Scene, camera: &mut Camera) {
        let (width, height) = surface.size();
        if width < 2 || height == 0 {
            return;
        }

        let viewports = Self::eye_viewports(width, height);
        camera.aspect = viewports[0].width as f32 / height as f32;

        surface.set_scissor_test(true);

        let origin = camera.position;
        let right = camera.forward().cross(camera.up).normalize_or_zero();

        for (viewport, side) in viewports.into_iter().zip([-1.0, 1.0]) {
            camera.position = origin + right * (side * self.eye_separation);
            surface.set_viewport(viewport);
            surface.set_scissor(viewport);
            surface.render(scene, camera);
        }

        camera.position = origin;
    }
}
