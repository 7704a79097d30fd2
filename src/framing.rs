use glam::Vec3;

use crate::camera::{Camera, DEFAULT_POSITION};
use crate::config::FramingConfig;
use crate::math::AABB;
use crate::scene_graph::SceneModel;

/// Uniform scale that brings the largest extent of `bounds` to `target_size`.
/// Degenerate boxes keep unit scale.
pub fn canonical_scale(bounds: &AABB, target_size: f32) -> f32 {
    let max_dimension = bounds.max_dimension();
    if max_dimension > 0.0 && max_dimension.is_finite() {
        target_size / max_dimension
    } else {
        1.0
    }
}

/// Translation that centers `bounds` on the X/Z origin and puts its floor at Y = 0.
pub fn ground_alignment(bounds: &AABB) -> Vec3 {
    let center = bounds.center();
    Vec3::new(-center.x, -bounds.min.y, -center.z)
}

/// Resets the model transform, scales it to `target_size` and grounds it at
/// the origin. Returns the resulting world-space box.
pub fn normalize_model(model: &mut SceneModel, target_size: f32) -> AABB {
    let root = model.root();
    model.set_object_transform(root, Vec3::ZERO, glam::Quat::IDENTITY, Vec3::ONE);

    let bounds = model.bounding_box();
    if bounds.is_empty() {
        return bounds;
    }

    let scale = canonical_scale(&bounds, target_size);
    model.set_object_scale(root, Vec3::splat(scale));

    let scaled = model.bounding_box();
    model.set_object_translation(root, ground_alignment(&scaled));

    model.bounding_box()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub position: Vec3,
    pub target: Vec3,
}

impl Framing {
    /// Where the camera starts before any model is shown.
    pub fn initial() -> Self {
        Self {
            position: DEFAULT_POSITION,
            target: Vec3::ZERO,
        }
    }

    pub fn apply(&self, camera: &mut Camera) {
        camera.position = self.position;
        camera.look_at(self.target);
    }
}

fn fit_distance(extent: f32, fov_y_radians: f32, margin: f32) -> Option<f32> {
    let distance = (extent / (fov_y_radians / 2.0).tan()).abs() * margin;
    (distance.is_finite() && distance > 0.0).then_some(distance)
}

/// Diagonal placement `(d, elevation * d, d)` from the box center.
fn diagonal(bounds: &AABB, distance: f32, elevation: f32) -> Framing {
    let target = bounds.center();
    Framing {
        position: target + Vec3::new(distance, distance * elevation, distance),
        target,
    }
}

/// Framing right after a load: the whole box fits with a generous margin.
pub fn frame_for_load(bounds: &AABB, fov_y_radians: f32, config: &FramingConfig) -> Option<Framing> {
    if bounds.is_empty() {
        return None;
    }

    let distance = fit_distance(bounds.max_dimension(), fov_y_radians, config.load_margin)?;
    Some(diagonal(bounds, distance, config.load_elevation))
}

/// Framing for "reset camera". Falls back to the initial view without a box.
pub fn frame_for_reset(bounds: Option<&AABB>, fov_y_radians: f32, config: &FramingConfig) -> Framing {
    bounds
        .filter(|bounds| !bounds.is_empty())
        .and_then(|bounds| {
            let distance =
                fit_distance(bounds.max_dimension() / 2.0, fov_y_radians, config.reset_margin)?;
            Some(diagonal(bounds, distance, config.reset_elevation))
        })
        .unwrap_or_else(Framing::initial)
}

/// Keeps the camera's bearing towards the box but pulls it to
/// `max_dimension * stereo_margin` and lifts it to `stereo_elevation` above
/// the center.
pub fn frame_from_direction(bounds: &AABB, camera_position: Vec3, config: &FramingConfig) -> Option<Framing> {
    if bounds.is_empty() {
        return None;
    }

    let target = bounds.center();
    let max_dimension = bounds.max_dimension();
    if max_dimension <= 0.0 {
        return None;
    }

    let direction = (camera_position - target).normalize_or(Vec3::new(1.0, 0.0, 1.0).normalize());
    let mut position = target + direction * max_dimension * config.stereo_margin;
    position.y = target.y + max_dimension * config.stereo_elevation;

    Some(Framing { position, target })
}
