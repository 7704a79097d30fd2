use glam::Vec3;

use crate::model::color_from_hex;
use crate::scene_graph::scene_model::SceneModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Light position; the light shines from here towards the origin.
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn new(position: Vec3, rgb: u32, intensity: f32) -> Self {
        Self {
            position,
            color: color_from_hex(rgb),
            intensity,
        }
    }

    /// Unit vector pointing from the lit surface towards the light.
    pub fn direction(&self) -> Vec3 {
        self.position.normalize_or(Vec3::Y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    pub key: DirectionalLight,
    pub rim: DirectionalLight,
    pub fill: DirectionalLight,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.5,
            key: DirectionalLight::new(Vec3::new(5.0, 10.0, 5.0), 0xffffff, 1.0),
            rim: DirectionalLight::new(Vec3::new(-5.0, 5.0, -5.0), 0x00d4ff, 0.5),
            fill: DirectionalLight::new(Vec3::new(0.0, -5.0, 5.0), 0xff00ff, 0.3),
        }
    }
}

/// Everything the renderer draws: the current model plus the environment
/// around it.
pub struct Scene {
    model: Option<SceneModel>,
    /// `None` renders a transparent background (AR passthrough).
    pub background: Option<Vec3>,
    pub lighting: Lighting,
    pub grid_visible: bool,
    pub wireframe: bool,
}

impl Scene {
    pub fn new(background: Vec3) -> Self {
        Self {
            model: None,
            background: Some(background),
            lighting: Lighting::default(),
            grid_visible: true,
            wireframe: false,
        }
    }

    pub fn model(&self) -> Option<&SceneModel> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut SceneModel> {
        self.model.as_mut()
    }

    /// Removes the current model, then inserts `model`. Returns the old one.
    pub fn replace_model(&mut self, model: SceneModel) -> Option<SceneModel> {
        let previous = self.model.take();
        self.model = Some(model);
        previous
    }

    pub fn take_model(&mut self) -> Option<SceneModel> {
        self.model.take()
    }

    pub fn update_world_matrices(&self) {
        if let Some(model) = &self.model {
            model.update_world_matrices();
        }
    }
}
