use glam::{Quat, Vec3};

use crate::scene_graph::{ObjectId, SceneModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
}

pub trait Interpolate: Copy {
    fn interpolate(from: Self, to: Self, factor: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(from: Self, to: Self, factor: f32) -> Self {
        from.lerp(to, factor)
    }
}

impl Interpolate for Quat {
    fn interpolate(from: Self, to: Self, factor: f32) -> Self {
        from.slerp(to, factor).normalize()
    }
}

#[derive(Debug, Clone)]
pub struct Keyframes<T> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: Interpolation,
}

impl<T: Interpolate> Keyframes<T> {
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Value at `time`. Holds the first/last key outside the keyed range.
    pub fn sample(&self, time: f32) -> Option<T> {
        let count = self.times.len().min(self.values.len());
        if count == 0 {
            return None;
        }

        if time <= self.times[0] {
            return Some(self.values[0]);
        }
        if time >= self.times[count - 1] {
            return Some(self.values[count - 1]);
        }

        let next = self.times[..count].partition_point(|&t| t <= time);
        let previous = next - 1;

        let value = match self.interpolation {
            Interpolation::Step => self.values[previous],
            Interpolation::Linear => {
                let (t0, t1) = (self.times[previous], self.times[next]);
                let span = t1 - t0;
                let factor = if span > 0.0 { (time - t0) / span } else { 0.0 };
                T::interpolate(self.values[previous], self.values[next], factor)
            }
        };

        Some(value)
    }
}

#[derive(Debug, Clone)]
pub enum Track {
    Translation(Keyframes<Vec3>),
    Rotation(Keyframes<Quat>),
    Scale(Keyframes<Vec3>),
}

impl Track {
    fn end_time(&self) -> f32 {
        match self {
            Track::Translation(keys) | Track::Scale(keys) => keys.end_time(),
            Track::Rotation(keys) => keys.end_time(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub target: ObjectId,
    pub track: Track,
}

/// A named, timed set of node tracks.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    /// Duration is the last key time across all channels.
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .map(|channel| channel.track.end_time())
            .fold(0.0, f32::max);

        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    /// Name for selectors; unnamed clips are numbered from one.
    pub fn display_name(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("Animation {}", index + 1)
        } else {
            self.name.clone()
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.channels.iter().map(|channel| channel.target)
    }

    /// Writes the pose at `time` into the model's node transforms.
    pub fn apply(&self, time: f32, model: &mut SceneModel) {
        for channel in &self.channels {
            match &channel.track {
                Track::Translation(keys) => {
                    if let Some(translation) = keys.sample(time) {
                        model.set_object_translation(channel.target, translation);
                    }
                }
                Track::Rotation(keys) => {
                    if let Some(rotation) = keys.sample(time) {
                        model.set_object_rotation(channel.target, rotation);
                    }
                }
                Track::Scale(keys) => {
                    if let Some(scale) = keys.sample(time) {
                        model.set_object_scale(channel.target, scale);
                    }
                }
            }
        }
    }
}
