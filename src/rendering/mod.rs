//! GPU side of the viewer plus the surface abstraction the core renders through.

pub mod grid;
pub mod imgui_renderer;
pub mod instance;
pub mod render_model;
pub mod renderer;
pub mod texture;

use crate::camera::Camera;
use crate::scene_graph::Scene;

/// Pixel rectangle in render-target coordinates, origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// What the viewer core needs from a renderer.
pub trait RenderSurface {
    /// Logical render-target size in pixels.
    fn size(&self) -> (u32, u32);
    fn set_size(&mut self, width: u32, height: u32);
    fn set_viewport(&mut self, viewport: Rect);
    fn set_scissor(&mut self, scissor: Rect);
    fn set_scissor_test(&mut self, enabled: bool);
    fn scissor_test(&self) -> bool;
    fn set_clear_alpha(&mut self, alpha: f32);
    fn clear_alpha(&self) -> f32;
    fn render(&mut self, scene: &Scene, camera: &Camera);
}

#[cfg(test)]
pub(crate) mod testing {
    use glam::Vec3;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRender {
        pub viewport: Rect,
        pub scissor: Rect,
        pub scissor_test: bool,
        pub camera_position: Vec3,
        pub aspect: f32,
        pub background: Option<Vec3>,
    }

    /// Surface that records state changes and render calls.
    pub struct RecordingSurface {
        pub width: u32,
        pub height: u32,
        pub viewport: Rect,
        pub scissor: Rect,
        pub scissor_test: bool,
        pub clear_alpha: f32,
        pub renders: Vec<RecordedRender>,
    }

    impl RecordingSurface {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                viewport: Rect::full(width, height),
                scissor: Rect::full(width, height),
                scissor_test: false,
                clear_alpha: 1.0,
                renders: Vec::new(),
            }
        }
    }

    impl RenderSurface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn set_size(&mut self, width: u32, height: u32) {
            self.width = width;
            self.height = height;
        }

        fn set_viewport(&mut self, viewport: Rect) {
            self.viewport = viewport;
        }

        fn set_scissor(&mut self, scissor: Rect) {
            self.scissor = scissor;
        }

        fn set_scissor_test(&mut self, enabled: bool) {
            self.scissor_test = enabled;
        }

        fn scissor_test(&self) -> bool {
            self.scissor_test
        }

        fn set_clear_alpha(&mut self, alpha: f32) {
            self.clear_alpha = alpha;
        }

        fn clear_alpha(&self) -> f32 {
            self.clear_alpha
        }

        fn render(&mut self, scene: &Scene, camera: &Camera) {
            self.renders.push(RecordedRender {
                viewport: self.viewport,
                scissor: self.scissor,
                scissor_test: self.scissor_test,
                camera_position: camera.position,
                aspect: camera.aspect,
                background: scene.background,
            });
        }
    }
}
